// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The client facade the host talks to.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loom_flags_bridge_core::{
	BridgeConfig, BridgeError, BridgeEvent, ConnectionInformation, EvaluationDetail, FlagValue,
	Identity, ListenerKind, Result, Topic, TrackEvent, VariationType,
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::channel::{EventChannel, DEFAULT_EVENT_CAPACITY};
use crate::dispatch::{Variation, VariationDispatcher, VariationRequest};
use crate::engine::SharedFlagEngine;
use crate::registry::ObserverRegistry;

/// Builder for constructing a [`FlagBridge`].
pub struct FlagBridgeBuilder {
	engine: Option<SharedFlagEngine>,
	event_capacity: usize,
}

impl FlagBridgeBuilder {
	pub fn new() -> Self {
		Self {
			engine: None,
			event_capacity: DEFAULT_EVENT_CAPACITY,
		}
	}

	/// Set the engine the bridge drives (required).
	pub fn engine(mut self, engine: SharedFlagEngine) -> Self {
		self.engine = Some(engine);
		self
	}

	/// Set how many undelivered events each host receiver may buffer.
	pub fn event_capacity(mut self, capacity: usize) -> Self {
		self.event_capacity = capacity;
		self
	}

	/// Build the bridge.
	pub fn build(self) -> Result<FlagBridge> {
		let engine = self
			.engine
			.ok_or_else(|| BridgeError::ConfigurationInvalid("an engine is required".to_string()))?;

		let channel = EventChannel::new(self.event_capacity);
		let inner = Arc::new(FlagBridgeInner {
			dispatcher: VariationDispatcher::new(Arc::clone(&engine)),
			registry: ObserverRegistry::new(Arc::clone(&engine), channel.clone()),
			engine,
			channel,
			config: RwLock::new(None),
			closed: AtomicBool::new(false),
		});

		Ok(FlagBridge { inner })
	}
}

impl Default for FlagBridgeBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Internal bridge state.
struct FlagBridgeInner {
	engine: SharedFlagEngine,
	dispatcher: VariationDispatcher,
	registry: ObserverRegistry,
	channel: EventChannel,
	config: RwLock<Option<BridgeConfig>>,
	closed: AtomicBool,
}

/// Exposes a flag engine to a host application.
///
/// Cheap to clone; clones share the engine, listeners and event channel.
#[derive(Clone)]
pub struct FlagBridge {
	inner: Arc<FlagBridgeInner>,
}

impl FlagBridge {
	pub fn builder() -> FlagBridgeBuilder {
		FlagBridgeBuilder::new()
	}

	/// Validates host inputs and starts the engine.
	///
	/// Resolves once the engine has loaded flags for `identity`. Either input
	/// being malformed fails with [`BridgeError::ConfigurationInvalid`] before
	/// the engine is touched.
	pub async fn configure(&self, config: &Value, identity: &Value) -> Result<()> {
		let config = BridgeConfig::from_value(config)?;
		let identity = Identity::from_value(identity)
			.map_err(|e| BridgeError::ConfigurationInvalid(e.to_string()))?;
		self.configure_with(config, identity).await
	}

	/// Starts the engine with already-typed inputs.
	pub async fn configure_with(&self, config: BridgeConfig, identity: Identity) -> Result<()> {
		if config.mobile_key.is_empty() {
			return Err(BridgeError::ConfigurationInvalid(
				"mobileKey must not be empty".to_string(),
			));
		}

		info!(
			context_key = %identity.key,
			offline = !config.start_online(),
			streaming = config.streaming(),
			"Configuring flag engine"
		);
		debug!(
			events_capacity = config.events_capacity(),
			flush_interval = ?config.events_flush_interval(),
			connection_timeout = ?config.connection_timeout(),
			polling_interval = ?config.polling_interval(),
			background_polling_interval = ?config.background_polling_interval(),
			background_updating_disabled = config.background_updating_disabled(),
			evaluation_reasons = config.evaluation_reasons(),
			use_report = config.use_report(),
			debug_mode = config.debug_mode(),
			"Effective engine configuration"
		);

		*self.inner.config.write() = Some(config.clone());
		self.inner.closed.store(false, Ordering::SeqCst);
		self.inner.engine.start(&config, &identity).await;

		info!(context_key = %identity.key, "Flag engine ready");
		Ok(())
	}

	/// Switches the active identity, resolving once its flags are loaded.
	pub async fn identify(&self, identity: &Value) -> Result<()> {
		let identity = Identity::from_value(identity)?;
		self.identify_with(identity).await
	}

	pub async fn identify_with(&self, identity: Identity) -> Result<()> {
		info!(context_key = %identity.key, "Identifying");
		self.inner.engine.identify(&identity).await;
		Ok(())
	}

	pub async fn set_online(&self, online: bool) {
		info!(online, "Setting connectivity");
		self.inner.engine.set_online(online).await;
	}

	pub async fn set_offline(&self) {
		self.set_online(false).await;
	}

	pub fn is_offline(&self) -> bool {
		!self.inner.engine.is_online()
	}

	/// Stops the engine and drops every listener registration.
	///
	/// Calls after the first are no-ops.
	pub async fn close(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			debug!("Bridge already closed");
			return;
		}

		let removed = self.inner.registry.unregister_all();
		self.inner.engine.close().await;
		info!(listeners_removed = removed, "Bridge closed");
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Requests delivery of queued analytics events.
	pub fn flush(&self) {
		self.inner.engine.flush();
	}

	/// Records a custom analytics event. Engine failures are logged and
	/// dropped.
	pub fn track(&self, event_name: &str, data: Option<FlagValue>, metric_value: Option<f64>) {
		let mut event = TrackEvent::new(event_name);
		if let Some(data) = data {
			event = event.with_data(data);
		}
		if let Some(metric_value) = metric_value {
			event = event.with_metric_value(metric_value);
		}

		match self.inner.engine.track(event) {
			Ok(()) => debug!(event_name, "Tracked event"),
			Err(BridgeError::ClientShutdown) => {
				debug!(event_name, "Engine closed, dropping event");
			}
			Err(e) => warn!(event_name, error = %e, "Dropping analytics event"),
		}
	}

	/// Snapshot of every loaded flag value.
	pub fn all_flags(&self) -> BTreeMap<String, FlagValue> {
		self.inner.engine.all_flags()
	}

	pub fn connection_information(&self) -> ConnectionInformation {
		self.inner.engine.connection_information()
	}

	/// Whether the configuration disables background flag updates.
	///
	/// `false` before the first configure.
	pub fn is_disable_background_polling(&self) -> bool {
		self.inner
			.config
			.read()
			.as_ref()
			.is_some_and(BridgeConfig::background_updating_disabled)
	}

	/// The configuration from the last configure call.
	pub fn config(&self) -> Option<BridgeConfig> {
		self.inner.config.read().clone()
	}

	pub fn evaluate(&self, request: &VariationRequest) -> Variation {
		self.inner.dispatcher.evaluate(request)
	}

	pub fn variation<T: VariationType>(&self, flag_key: &str, fallback: T) -> T {
		self.inner.dispatcher.variation(flag_key, fallback)
	}

	pub fn try_variation<T: VariationType>(&self, flag_key: &str) -> Option<T> {
		self.inner.dispatcher.try_variation(flag_key)
	}

	pub fn variation_detail<T: VariationType>(
		&self,
		flag_key: &str,
		fallback: Option<T>,
	) -> EvaluationDetail<T> {
		self.inner.dispatcher.variation_detail(flag_key, fallback)
	}

	/// Listens for changes to `flag_key`. Returns `false` if the id was
	/// already registered.
	pub fn register_feature_flag_listener(&self, flag_key: &str) -> bool {
		self.inner.registry.register(flag_key, ListenerKind::PerFlag)
	}

	pub fn unregister_feature_flag_listener(&self, flag_key: &str) -> bool {
		self.inner.registry.unregister(flag_key)
	}

	pub fn register_all_flags_listener(&self, listener_id: &str) -> bool {
		self.inner.registry.register(listener_id, ListenerKind::AllFlags)
	}

	pub fn unregister_all_flags_listener(&self, listener_id: &str) -> bool {
		self.inner.registry.unregister(listener_id)
	}

	pub fn register_connection_mode_listener(&self, listener_id: &str) -> bool {
		self.inner.registry.register(listener_id, ListenerKind::ConnectionMode)
	}

	pub fn unregister_connection_mode_listener(&self, listener_id: &str) -> bool {
		self.inner.registry.unregister(listener_id)
	}

	pub fn listener_count(&self) -> usize {
		self.inner.registry.len()
	}

	/// Subscribes to outbound notifications emitted from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
		self.inner.channel.subscribe()
	}

	/// Topic names exported to the host.
	pub fn constants() -> BTreeMap<&'static str, &'static str> {
		BTreeMap::from([
			("FLAG_TOPIC", Topic::FlagChanged.name()),
			("ALL_FLAGS_TOPIC", Topic::AllFlagsChanged.name()),
			("CONNECTION_MODE_TOPIC", Topic::ConnectionModeChanged.name()),
		])
	}
}
