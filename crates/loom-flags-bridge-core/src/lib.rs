// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Boundary-safe types for the Loom feature flags host bridge.
//!
//! This crate holds everything that crosses the serialization boundary
//! between a host application and the flag engine: tagged flag values and
//! their codec, evaluation details, connection state, listener kinds,
//! outbound events, and the configure/identify inputs. Behaviour lives in
//! `loom-flags-bridge`.
//!
//! # Example
//!
//! ```
//! use loom_flags_bridge_core::{codec, FlagValue, ValueKind};
//!
//! let raw = serde_json::json!({ "limit": 5, "ratio": 0.5 });
//! let value = codec::decode(&raw, ValueKind::Object);
//! assert_eq!(codec::encode(&value), raw);
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod detail;
pub mod error;
pub mod event;
pub mod identity;
pub mod listener;
pub mod track;
pub mod value;

pub use config::BridgeConfig;
pub use connection::{ConnectionInformation, ConnectionMode};
pub use detail::{EvaluationDetail, EvaluationErrorKind, EvaluationReason};
pub use error::{BridgeError, Result};
pub use event::{BridgeEvent, Topic};
pub use identity::Identity;
pub use listener::{ListenerKind, ObserverToken};
pub use track::TrackEvent;
pub use value::{FlagValue, ValueKind, VariationType};
