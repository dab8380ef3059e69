// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deduplicated registry of change listeners.
//!
//! The registry is one flat map from listener id to registration, shared by
//! all three listener kinds. A per-flag listener on `"foo"` and an all-flags
//! listener with id `"foo"` therefore cannot coexist: whichever registers
//! second is ignored, exactly like a repeated registration of the same kind.
//!
//! Registration holds the map lock across the engine subscribe call so two
//! concurrent registrations of one id cannot both subscribe. Unregistration
//! removes the entry first and calls the engine after the lock is released;
//! a notification already in flight at that point may still be delivered
//! once.

use std::collections::HashMap;
use std::sync::Arc;

use loom_flags_bridge_core::{BridgeEvent, ConnectionMode, ListenerKind, ObserverToken};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::channel::EventChannel;
use crate::engine::{ConnectionModeHandler, FlagChangeHandler, SharedFlagEngine};

/// One active listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRegistration {
	/// Flag key for per-flag listeners, host-chosen id otherwise.
	pub id: String,
	pub kind: ListenerKind,
	/// Engine handle used to end the subscription.
	pub token: ObserverToken,
}

/// Maps listener ids to engine subscriptions and routes engine callbacks to
/// the outbound [`EventChannel`].
pub struct ObserverRegistry {
	engine: SharedFlagEngine,
	channel: EventChannel,
	entries: Mutex<HashMap<String, ListenerRegistration>>,
}

impl ObserverRegistry {
	pub fn new(engine: SharedFlagEngine, channel: EventChannel) -> Self {
		Self {
			engine,
			channel,
			entries: Mutex::new(HashMap::new()),
		}
	}

	/// Registers a listener unless `id` is already taken.
	///
	/// Returns `true` if a new engine subscription was made. An existing
	/// registration under `id` is left untouched, whatever its kind.
	pub fn register(&self, id: &str, kind: ListenerKind) -> bool {
		let mut entries = self.entries.lock();

		if let Some(existing) = entries.get(id) {
			debug!(
				listener_id = id,
				existing = %existing.kind,
				requested = %kind,
				"Listener id already registered, ignoring"
			);
			return false;
		}

		// Handlers only touch the channel, so an engine that calls them
		// synchronously from inside observe cannot deadlock on `entries`.
		let token = match kind {
			ListenerKind::PerFlag => self.engine.observe_flag(id, self.flag_handler(id)),
			ListenerKind::AllFlags => self.engine.observe_all(self.all_flags_handler(id)),
			ListenerKind::ConnectionMode => self
				.engine
				.observe_connection_mode(self.connection_mode_handler(id)),
		};

		entries.insert(
			id.to_string(),
			ListenerRegistration {
				id: id.to_string(),
				kind,
				token,
			},
		);

		debug!(listener_id = id, %kind, topic = %kind.topic(), %token, "Listener registered");
		true
	}

	/// Removes the listener registered under `id`, whatever its kind.
	///
	/// Returns `false` if nothing was registered.
	pub fn unregister(&self, id: &str) -> bool {
		let removed = self.entries.lock().remove(id);

		match removed {
			Some(registration) => {
				self.engine.stop_observing(registration.token);
				debug!(listener_id = id, kind = %registration.kind, "Listener unregistered");
				true
			}
			None => false,
		}
	}

	/// Removes every listener.
	pub fn unregister_all(&self) -> usize {
		let drained: Vec<ListenerRegistration> =
			self.entries.lock().drain().map(|(_, registration)| registration).collect();

		for registration in &drained {
			self.engine.stop_observing(registration.token);
		}

		if !drained.is_empty() {
			info!(count = drained.len(), "Removed all listeners");
		}
		drained.len()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.entries.lock().contains_key(id)
	}

	pub fn get(&self, id: &str) -> Option<ListenerRegistration> {
		self.entries.lock().get(id).cloned()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	fn flag_handler(&self, flag_key: &str) -> FlagChangeHandler {
		let channel = self.channel.clone();
		let flag_key = flag_key.to_string();
		Arc::new(move |changed: &[String]| {
			if changed.iter().any(|key| *key == flag_key) {
				channel.emit(BridgeEvent::FlagChanged {
					flag_key: flag_key.clone(),
				});
			}
		})
	}

	fn all_flags_handler(&self, listener_id: &str) -> FlagChangeHandler {
		let channel = self.channel.clone();
		let listener_id = listener_id.to_string();
		Arc::new(move |changed: &[String]| {
			channel.emit(BridgeEvent::AllFlagsChanged {
				listener_id: listener_id.clone(),
				changed_flag_keys: changed.to_vec(),
			});
		})
	}

	fn connection_mode_handler(&self, listener_id: &str) -> ConnectionModeHandler {
		let channel = self.channel.clone();
		let listener_id = listener_id.to_string();
		Arc::new(move |mode: ConnectionMode| {
			channel.emit(BridgeEvent::ConnectionModeChanged {
				listener_id: listener_id.clone(),
				connection_mode: mode,
			});
		})
	}
}
