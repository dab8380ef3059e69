// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Outbound notifications delivered to the host.
//!
//! # Topics
//!
//! | Topic | Body |
//! |-------|------|
//! | `flags.changed.one` | `{ "flagKey": "..." }` |
//! | `flags.changed.all` | `{ "listenerId": "...", "changedFlagKeys": [...] }` |
//! | `connection.mode` | `{ "listenerId": "...", "connectionMode": "..." }` |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::connection::ConnectionMode;

/// Name of an outbound notification stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
	#[serde(rename = "flags.changed.one")]
	FlagChanged,
	#[serde(rename = "flags.changed.all")]
	AllFlagsChanged,
	#[serde(rename = "connection.mode")]
	ConnectionModeChanged,
}

impl Topic {
	pub const ALL: [Topic; 3] = [
		Topic::FlagChanged,
		Topic::AllFlagsChanged,
		Topic::ConnectionModeChanged,
	];

	pub fn name(&self) -> &'static str {
		match self {
			Topic::FlagChanged => "flags.changed.one",
			Topic::AllFlagsChanged => "flags.changed.all",
			Topic::ConnectionModeChanged => "connection.mode",
		}
	}
}

impl fmt::Display for Topic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// One notification on the outbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "body")]
pub enum BridgeEvent {
	/// A flag with a registered per-flag listener changed.
	#[serde(rename = "flags.changed.one", rename_all = "camelCase")]
	FlagChanged { flag_key: String },

	/// The engine reported a set of changed flags to an all-flags listener.
	#[serde(rename = "flags.changed.all", rename_all = "camelCase")]
	AllFlagsChanged {
		listener_id: String,
		changed_flag_keys: Vec<String>,
	},

	/// The engine's connection mode changed.
	#[serde(rename = "connection.mode", rename_all = "camelCase")]
	ConnectionModeChanged {
		listener_id: String,
		connection_mode: ConnectionMode,
	},
}

impl BridgeEvent {
	pub fn topic(&self) -> Topic {
		match self {
			BridgeEvent::FlagChanged { .. } => Topic::FlagChanged,
			BridgeEvent::AllFlagsChanged { .. } => Topic::AllFlagsChanged,
			BridgeEvent::ConnectionModeChanged { .. } => Topic::ConnectionModeChanged,
		}
	}

	/// The payload sent under [`BridgeEvent::topic`].
	pub fn body(&self) -> Value {
		match self {
			BridgeEvent::FlagChanged { flag_key } => json!({ "flagKey": flag_key }),
			BridgeEvent::AllFlagsChanged {
				listener_id,
				changed_flag_keys,
			} => json!({
				"listenerId": listener_id,
				"changedFlagKeys": changed_flag_keys,
			}),
			BridgeEvent::ConnectionModeChanged {
				listener_id,
				connection_mode,
			} => json!({
				"listenerId": listener_id,
				"connectionMode": connection_mode.as_str(),
			}),
		}
	}
}
