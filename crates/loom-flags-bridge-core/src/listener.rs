// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Listener kinds and engine subscription handles.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Topic;

/// What a registered listener is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerKind {
	/// Changes to one flag; the listener id is the flag key.
	PerFlag,
	/// Any flag change; the listener id is chosen by the host.
	AllFlags,
	/// Connection-mode transitions; the listener id is chosen by the host.
	ConnectionMode,
}

impl ListenerKind {
	/// The outbound topic notifications for this kind are sent on.
	pub fn topic(&self) -> Topic {
		match self {
			ListenerKind::PerFlag => Topic::FlagChanged,
			ListenerKind::AllFlags => Topic::AllFlagsChanged,
			ListenerKind::ConnectionMode => Topic::ConnectionModeChanged,
		}
	}
}

impl fmt::Display for ListenerKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ListenerKind::PerFlag => f.write_str("per_flag"),
			ListenerKind::AllFlags => f.write_str("all_flags"),
			ListenerKind::ConnectionMode => f.write_str("connection_mode"),
		}
	}
}

/// Opaque handle returned by an engine subscription.
///
/// Passing it back to the engine stops that subscription. It is never
/// derived from the listener id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverToken(pub Uuid);

impl ObserverToken {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for ObserverToken {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for ObserverToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}
