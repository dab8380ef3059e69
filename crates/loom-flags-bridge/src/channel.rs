// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The single outbound notification channel.
//!
//! Engine callbacks arrive on whatever thread the engine uses. Emitting only
//! pushes into a broadcast channel; the host drains its receiver on its own
//! context, so the two never have to share one. Events reach the receivers
//! subscribed at emission time and are not replayed to later subscribers.

use loom_flags_bridge_core::BridgeEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of undelivered events buffered per receiver.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Multiplexed outbound channel for flag, all-flags and connection-mode
/// notifications.
#[derive(Debug, Clone)]
pub struct EventChannel {
	sender: broadcast::Sender<BridgeEvent>,
}

impl EventChannel {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Subscribes to every event emitted from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
		self.sender.subscribe()
	}

	/// Sends an event to the current subscribers.
	///
	/// Returns how many receivers it was queued for. With no host attached
	/// the event is dropped.
	pub fn emit(&self, event: BridgeEvent) -> usize {
		let topic = event.topic();
		match self.sender.send(event) {
			Ok(receivers) => receivers,
			Err(_) => {
				debug!(%topic, "No host subscribed, dropping event");
				0
			}
		}
	}

	pub fn receiver_count(&self) -> usize {
		self.sender.receiver_count()
	}
}

impl Default for EventChannel {
	fn default() -> Self {
		Self::new(DEFAULT_EVENT_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_flags_bridge_core::ConnectionMode;

	fn flag_event(key: &str) -> BridgeEvent {
		BridgeEvent::FlagChanged {
			flag_key: key.to_string(),
		}
	}

	#[test]
	fn emit_without_subscribers_is_dropped() {
		let channel = EventChannel::default();
		assert_eq!(channel.emit(flag_event("a")), 0);
	}

	#[tokio::test]
	async fn every_subscriber_receives_each_event() {
		let channel = EventChannel::default();
		let mut first = channel.subscribe();
		let mut second = channel.subscribe();

		assert_eq!(channel.emit(flag_event("a")), 2);

		assert_eq!(first.recv().await.unwrap(), flag_event("a"));
		assert_eq!(second.recv().await.unwrap(), flag_event("a"));
	}

	#[tokio::test]
	async fn late_subscribers_get_no_replay() {
		let channel = EventChannel::default();
		let _early = channel.subscribe();
		channel.emit(flag_event("before"));

		let mut late = channel.subscribe();
		let event = BridgeEvent::ConnectionModeChanged {
			listener_id: "l".to_string(),
			connection_mode: ConnectionMode::Polling,
		};
		channel.emit(event.clone());

		assert_eq!(late.recv().await.unwrap(), event);
		assert!(late.try_recv().is_err());
	}

	#[test]
	fn events_can_be_emitted_from_other_threads() {
		let channel = EventChannel::default();
		let mut rx = channel.subscribe();

		let handles: Vec<_> = (0..4)
			.map(|i| {
				let channel = channel.clone();
				std::thread::spawn(move || channel.emit(flag_event(&format!("flag{i}"))))
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}

		let mut received = 0;
		while rx.try_recv().is_ok() {
			received += 1;
		}
		assert_eq!(received, 4);
	}
}
