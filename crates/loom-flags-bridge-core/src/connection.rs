// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Connection state reported by the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the engine is currently receiving flag updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionMode {
	Streaming,
	EstablishingStreamingConnection,
	Polling,
	Offline,
	/// Backgrounded with background updates turned off.
	BackgroundDisabled,
}

impl ConnectionMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConnectionMode::Streaming => "streaming",
			ConnectionMode::EstablishingStreamingConnection => "establishingStreamingConnection",
			ConnectionMode::Polling => "polling",
			ConnectionMode::Offline => "offline",
			ConnectionMode::BackgroundDisabled => "backgroundDisabled",
		}
	}
}

impl fmt::Display for ConnectionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Snapshot of the engine's connection health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInformation {
	pub current_connection_mode: ConnectionMode,
	/// When flag values were last known to be current.
	pub last_known_flag_validity: Option<DateTime<Utc>>,
	pub last_failed_connection: Option<DateTime<Utc>>,
	pub last_connection_failure_reason: Option<String>,
}

impl ConnectionInformation {
	pub fn new(mode: ConnectionMode) -> Self {
		Self {
			current_connection_mode: mode,
			last_known_flag_validity: None,
			last_failed_connection: None,
			last_connection_failure_reason: None,
		}
	}

	pub fn to_boundary(&self) -> Value {
		serde_json::to_value(self).unwrap_or(Value::Null)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mode_serializes_as_camel_case() {
		assert_eq!(
			serde_json::to_value(ConnectionMode::EstablishingStreamingConnection).unwrap(),
			"establishingStreamingConnection"
		);
		assert_eq!(ConnectionMode::Offline.to_string(), "offline");
	}

	#[test]
	fn information_uses_boundary_field_names() {
		let info = ConnectionInformation::new(ConnectionMode::Polling);
		let value = info.to_boundary();

		assert_eq!(value["currentConnectionMode"], "polling");
		assert!(value["lastKnownFlagValidity"].is_null());
		assert!(value["lastConnectionFailureReason"].is_null());
	}
}
