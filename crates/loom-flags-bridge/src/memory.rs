// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A local, in-process [`FlagEngine`].
//!
//! Flag sets are loaded per context key by whatever feeds the engine (a test,
//! a bundled defaults file, a sync job). Loading the active context's flags
//! diffs them against the current set and notifies observers with the keys
//! that changed. `start` and `identify` wait until flags for their context
//! have been loaded.
//!
//! Analytics events are queued up to the configured capacity, dropping the
//! oldest on overflow, and only drained by `flush` while online.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use loom_flags_bridge_core::config::DEFAULT_EVENTS_CAPACITY;
use loom_flags_bridge_core::{
	BridgeConfig, BridgeError, ConnectionInformation, ConnectionMode, EvaluationDetail,
	EvaluationReason, FlagValue, Identity, ObserverToken, Result, TrackEvent,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::{ConnectionModeHandler, FlagChangeHandler, FlagEngine};

/// A loaded flag: its value and which variation produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFlag {
	pub value: FlagValue,
	pub variation_index: Option<u32>,
	pub reason: EvaluationReason,
}

impl StoredFlag {
	pub fn new(value: impl Into<FlagValue>) -> Self {
		Self {
			value: value.into(),
			variation_index: None,
			reason: EvaluationReason::Fallthrough,
		}
	}

	pub fn with_variation(mut self, index: u32) -> Self {
		self.variation_index = Some(index);
		self
	}

	pub fn with_reason(mut self, reason: EvaluationReason) -> Self {
		self.reason = reason;
		self
	}
}

impl From<FlagValue> for StoredFlag {
	fn from(value: FlagValue) -> Self {
		StoredFlag::new(value)
	}
}

enum Observer {
	Flag {
		flag_key: String,
		handler: FlagChangeHandler,
	},
	All(FlagChangeHandler),
	ConnectionMode(ConnectionModeHandler),
}

struct EngineState {
	config: Option<BridgeConfig>,
	/// Flag sets loaded so far, by context key.
	contexts: HashMap<String, BTreeMap<String, StoredFlag>>,
	/// Context whose flags are being served.
	active_key: Option<String>,
	/// Flags of `active_key`, once loaded.
	active: Option<BTreeMap<String, StoredFlag>>,
	connection: ConnectionInformation,
}

/// In-process engine with per-context flag sets.
pub struct InMemoryEngine {
	state: RwLock<EngineState>,
	observers: Mutex<HashMap<ObserverToken, Observer>>,
	/// Bumped on every load so waiters can re-check their context.
	loads: watch::Sender<u64>,
	online: AtomicBool,
	closed: AtomicBool,
	queued_events: Mutex<VecDeque<TrackEvent>>,
	delivered_events: Mutex<Vec<TrackEvent>>,
}

impl InMemoryEngine {
	pub fn new() -> Self {
		let (loads, _) = watch::channel(0);
		Self {
			state: RwLock::new(EngineState {
				config: None,
				contexts: HashMap::new(),
				active_key: None,
				active: None,
				connection: ConnectionInformation::new(ConnectionMode::Offline),
			}),
			observers: Mutex::new(HashMap::new()),
			loads,
			online: AtomicBool::new(false),
			closed: AtomicBool::new(false),
			queued_events: Mutex::new(VecDeque::new()),
			delivered_events: Mutex::new(Vec::new()),
		}
	}

	/// Loads the flag set for `context_key`, replacing any previous set.
	///
	/// If `context_key` is the active context, observers are notified of
	/// every added, removed or modified key.
	pub fn load_flags<I, K, V>(&self, context_key: &str, flags: I)
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<StoredFlag>,
	{
		let flags: BTreeMap<String, StoredFlag> = flags
			.into_iter()
			.map(|(k, v)| (k.into(), v.into()))
			.collect();
		let count = flags.len();

		let changed = {
			let mut state = self.state.write();
			state.contexts.insert(context_key.to_string(), flags);
			if state.active_key.as_deref() == Some(context_key) {
				activate(&mut state, context_key)
			} else {
				Vec::new()
			}
		};

		info!(context_key, flags = count, "Flags loaded");
		self.loads.send_modify(|generation| *generation += 1);
		self.notify_flags(&changed);
	}

	/// Sets or replaces one flag in an already-loaded context.
	pub fn upsert_flag(&self, context_key: &str, flag_key: &str, flag: impl Into<StoredFlag>) {
		let mut flags = self.flags_for(context_key);
		flags.insert(flag_key.to_string(), flag.into());
		self.load_flags(context_key, flags);
	}

	/// Removes one flag from a loaded context.
	pub fn remove_flag(&self, context_key: &str, flag_key: &str) {
		let mut flags = self.flags_for(context_key);
		if flags.remove(flag_key).is_some() {
			self.load_flags(context_key, flags);
		}
	}

	/// Reports a connection-mode transition to observers.
	pub fn set_connection_mode(&self, mode: ConnectionMode) {
		let changed = {
			let mut state = self.state.write();
			let previous = state.connection.current_connection_mode;
			state.connection.current_connection_mode = mode;
			previous != mode
		};
		if changed {
			debug!(%mode, "Connection mode changed");
			self.notify_connection_mode(mode);
		}
	}

	/// Records a failed connection attempt.
	pub fn record_connection_failure(&self, reason: impl Into<String>) {
		let mut state = self.state.write();
		state.connection.last_failed_connection = Some(Utc::now());
		state.connection.last_connection_failure_reason = Some(reason.into());
	}

	/// Analytics events waiting for a flush.
	pub fn queued_events(&self) -> Vec<TrackEvent> {
		self.queued_events.lock().iter().cloned().collect()
	}

	/// Analytics events drained by flushes so far.
	pub fn delivered_events(&self) -> Vec<TrackEvent> {
		self.delivered_events.lock().clone()
	}

	pub fn observer_count(&self) -> usize {
		self.observers.lock().len()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// The identity key flags are currently served for.
	pub fn active_context(&self) -> Option<String> {
		self.state.read().active_key.clone()
	}

	fn flags_for(&self, context_key: &str) -> BTreeMap<String, StoredFlag> {
		self.state
			.read()
			.contexts
			.get(context_key)
			.cloned()
			.unwrap_or_default()
	}

	/// Switches to `context_key` and waits until its flags are loaded.
	async fn switch_context(&self, context_key: &str) {
		let mut loads = self.loads.subscribe();
		let changed = {
			let mut state = self.state.write();
			state.active_key = Some(context_key.to_string());
			if state.contexts.contains_key(context_key) {
				Some(activate(&mut state, context_key))
			} else {
				state.active = None;
				None
			}
		};

		match changed {
			Some(changed) => self.notify_flags(&changed),
			None => {
				debug!(context_key, "Waiting for flags");
				// Loading the active context activates it, so this only has
				// to watch for the active set to appear.
				loop {
					if loads.changed().await.is_err() {
						return;
					}
					let state = self.state.read();
					if state.active_key.as_deref() != Some(context_key) || state.active.is_some() {
						break;
					}
				}
			}
		}

		let mut state = self.state.write();
		state.connection.last_known_flag_validity = Some(Utc::now());
	}

	fn online_mode(&self) -> ConnectionMode {
		let streaming = self
			.state
			.read()
			.config
			.as_ref()
			.map(BridgeConfig::streaming)
			.unwrap_or(true);
		if streaming {
			ConnectionMode::Streaming
		} else {
			ConnectionMode::Polling
		}
	}

	fn notify_flags(&self, changed: &[String]) {
		if changed.is_empty() {
			return;
		}

		// Handlers run outside the observer lock so they may call back
		// into the engine.
		let handlers: Vec<FlagChangeHandler> = self
			.observers
			.lock()
			.values()
			.filter_map(|observer| match observer {
				Observer::Flag { flag_key, handler } if changed.contains(flag_key) => {
					Some(handler.clone())
				}
				Observer::All(handler) => Some(handler.clone()),
				_ => None,
			})
			.collect();

		debug!(changed = ?changed, observers = handlers.len(), "Notifying flag observers");
		for handler in handlers {
			handler(changed);
		}
	}

	fn notify_connection_mode(&self, mode: ConnectionMode) {
		let handlers: Vec<ConnectionModeHandler> = self
			.observers
			.lock()
			.values()
			.filter_map(|observer| match observer {
				Observer::ConnectionMode(handler) => Some(handler.clone()),
				_ => None,
			})
			.collect();

		for handler in handlers {
			handler(mode);
		}
	}

	fn add_observer(&self, observer: Observer) -> ObserverToken {
		let token = ObserverToken::new();
		self.observers.lock().insert(token, observer);
		token
	}
}

impl Default for InMemoryEngine {
	fn default() -> Self {
		Self::new()
	}
}

/// Makes `context_key`'s loaded flags active and returns the changed keys.
fn activate(state: &mut EngineState, context_key: &str) -> Vec<String> {
	let next = state.contexts.get(context_key).cloned().unwrap_or_default();
	let previous = state.active.take().unwrap_or_default();

	let mut changed: Vec<String> = next
		.iter()
		.filter(|(key, flag)| previous.get(*key) != Some(*flag))
		.map(|(key, _)| key.clone())
		.collect();
	changed.extend(previous.keys().filter(|key| !next.contains_key(*key)).cloned());
	changed.sort();

	state.active = Some(next);
	changed
}

#[async_trait]
impl FlagEngine for InMemoryEngine {
	async fn start(&self, config: &BridgeConfig, identity: &Identity) {
		let start_online = config.start_online();
		{
			let mut state = self.state.write();
			state.config = Some(config.clone());
		}
		self.closed.store(false, Ordering::SeqCst);
		self.online.store(start_online, Ordering::SeqCst);

		if !start_online {
			let changed = {
				let mut state = self.state.write();
				state.active_key = Some(identity.key.clone());
				if state.contexts.contains_key(&identity.key) {
					activate(&mut state, &identity.key)
				} else {
					// Nothing cached for this identity; never serve the previous one's flags.
					let previous = state.active.take().unwrap_or_default();
					previous.into_keys().collect()
				}
			};
			self.notify_flags(&changed);
			info!(context_key = %identity.key, "Engine started offline");
			return;
		}

		self.set_connection_mode(self.online_mode());
		self.switch_context(&identity.key).await;
		info!(context_key = %identity.key, "Engine started");
	}

	async fn identify(&self, identity: &Identity) {
		self.switch_context(&identity.key).await;
		info!(context_key = %identity.key, "Identity switched");
	}

	async fn set_online(&self, online: bool) {
		self.online.store(online, Ordering::SeqCst);
		let mode = if online {
			self.online_mode()
		} else {
			ConnectionMode::Offline
		};
		self.set_connection_mode(mode);
	}

	fn is_online(&self) -> bool {
		self.online.load(Ordering::SeqCst)
	}

	async fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
		self.online.store(false, Ordering::SeqCst);
		self.set_connection_mode(ConnectionMode::Offline);
		info!("Engine closed");
	}

	fn flush(&self) {
		if !self.is_online() {
			debug!("Offline, keeping analytics events queued");
			return;
		}
		let drained: Vec<TrackEvent> = self.queued_events.lock().drain(..).collect();
		if drained.is_empty() {
			return;
		}
		debug!(count = drained.len(), "Flushing analytics events");
		self.delivered_events.lock().extend(drained);
	}

	fn track(&self, event: TrackEvent) -> Result<()> {
		if self.is_closed() {
			return Err(BridgeError::ClientShutdown);
		}
		if event.key.is_empty() {
			return Err(BridgeError::TrackingFailed("event name is empty".to_string()));
		}
		if event.metric_value.is_some_and(|m| !m.is_finite()) {
			return Err(BridgeError::TrackingFailed("metric value is not finite".to_string()));
		}

		let capacity = self
			.state
			.read()
			.config
			.as_ref()
			.map(BridgeConfig::events_capacity)
			.unwrap_or(DEFAULT_EVENTS_CAPACITY);

		let mut queue = self.queued_events.lock();
		while !queue.is_empty() && queue.len() >= capacity {
			if let Some(dropped) = queue.pop_front() {
				warn!(event_name = %dropped.key, "Dropped event due to queue overflow");
			}
		}
		if capacity > 0 {
			queue.push_back(event);
		}
		Ok(())
	}

	fn evaluate(&self, flag_key: &str) -> EvaluationDetail<FlagValue> {
		let state = self.state.read();
		let Some(active) = state.active.as_ref() else {
			return EvaluationDetail::absent(EvaluationReason::client_not_ready());
		};
		match active.get(flag_key) {
			Some(flag) => {
				EvaluationDetail::new(flag.value.clone(), flag.variation_index, flag.reason.clone())
			}
			None => EvaluationDetail::absent(EvaluationReason::flag_not_found()),
		}
	}

	fn all_flags(&self) -> BTreeMap<String, FlagValue> {
		self.state
			.read()
			.active
			.as_ref()
			.map(|flags| {
				flags
					.iter()
					.map(|(key, flag)| (key.clone(), flag.value.clone()))
					.collect()
			})
			.unwrap_or_default()
	}

	fn observe_flag(&self, flag_key: &str, handler: FlagChangeHandler) -> ObserverToken {
		self.add_observer(Observer::Flag {
			flag_key: flag_key.to_string(),
			handler,
		})
	}

	fn observe_all(&self, handler: FlagChangeHandler) -> ObserverToken {
		self.add_observer(Observer::All(handler))
	}

	fn observe_connection_mode(&self, handler: ConnectionModeHandler) -> ObserverToken {
		self.add_observer(Observer::ConnectionMode(handler))
	}

	fn stop_observing(&self, token: ObserverToken) {
		self.observers.lock().remove(&token);
	}

	fn connection_information(&self) -> ConnectionInformation {
		self.state.read().connection.clone()
	}
}
