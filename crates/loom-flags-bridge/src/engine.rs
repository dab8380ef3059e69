// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The seam between the bridge and the flag-evaluation engine.
//!
//! The engine owns rule evaluation, transport and local flag storage. The
//! bridge only needs the operations below. Implementations must be callable
//! from any thread and may invoke observer handlers from any thread,
//! including synchronously from inside [`FlagEngine::stop_observing`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use loom_flags_bridge_core::{
	BridgeConfig, ConnectionInformation, ConnectionMode, EvaluationDetail, FlagValue, Identity,
	ObserverToken, Result, TrackEvent,
};

/// Receives the keys of flags that changed in one engine update.
pub type FlagChangeHandler = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Receives the engine's new connection mode.
pub type ConnectionModeHandler = Arc<dyn Fn(ConnectionMode) + Send + Sync>;

/// A flag-evaluation engine the bridge can drive.
///
/// Completion of the async lifecycle methods means the engine-side operation
/// is done, not merely requested.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlagEngine: Send + Sync + 'static {
	/// Starts the engine, resolving once flags for `identity` are loaded.
	///
	/// An engine configured to start offline resolves immediately.
	async fn start(&self, config: &BridgeConfig, identity: &Identity);

	/// Switches the active identity, resolving once its flags are loaded.
	async fn identify(&self, identity: &Identity);

	/// Resolves once the engine has reached the requested connectivity.
	async fn set_online(&self, online: bool);

	fn is_online(&self) -> bool;

	/// Stops the engine.
	async fn close(&self);

	/// Requests delivery of queued analytics events.
	fn flush(&self);

	/// Queues a custom analytics event.
	fn track(&self, event: TrackEvent) -> Result<()>;

	/// Looks up the current value of a flag in already-loaded state.
	///
	/// Returns an absent detail with an error reason when the flag is not
	/// loaded.
	fn evaluate(&self, flag_key: &str) -> EvaluationDetail<FlagValue>;

	/// Snapshot of every loaded flag value.
	fn all_flags(&self) -> BTreeMap<String, FlagValue>;

	/// Subscribes to changes of a single flag.
	fn observe_flag(&self, flag_key: &str, handler: FlagChangeHandler) -> ObserverToken;

	/// Subscribes to every flag change.
	fn observe_all(&self, handler: FlagChangeHandler) -> ObserverToken;

	/// Subscribes to connection-mode transitions.
	fn observe_connection_mode(&self, handler: ConnectionModeHandler) -> ObserverToken;

	/// Ends a subscription. No handler for `token` runs after this returns,
	/// other than one already executing.
	fn stop_observing(&self, token: ObserverToken);

	fn connection_information(&self) -> ConnectionInformation;
}

/// Type alias for a shared engine.
pub type SharedFlagEngine = Arc<dyn FlagEngine>;
