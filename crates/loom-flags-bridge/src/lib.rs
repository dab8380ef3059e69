// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flags host bridge for Loom.
//!
//! This crate exposes a feature flag engine to a host application that can
//! only exchange JSON values and asynchronous results with it, such as a
//! mobile UI runtime.
//!
//! # Features
//!
//! - **Typed evaluation**: one dispatcher for every value kind, with or without
//!   fallbacks and evaluation details
//! - **Change listeners**: per-flag, all-flags and connection-mode listeners,
//!   deduplicated by id
//! - **Outbound events**: engine callbacks multiplexed onto one broadcast
//!   channel the host drains on its own thread
//! - **Ready barrier**: configure and identify resolve only once flags are
//!   loaded
//! - **Host router**: `FlagBridge::call` accepts host method names and JSON
//!   arguments
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use loom_flags_bridge::{FlagBridge, FlagValue, InMemoryEngine};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(InMemoryEngine::new());
//!     engine.load_flags("user1", [("checkout.new_flow", FlagValue::Bool(true))]);
//!
//!     let bridge = FlagBridge::builder().engine(engine).build()?;
//!     let mut events = bridge.subscribe();
//!
//!     bridge
//!         .configure(&json!({ "mobileKey": "mob-xxx" }), &json!({ "key": "user1" }))
//!         .await?;
//!
//!     let enabled = bridge.variation("checkout.new_flow", false);
//!     bridge.register_feature_flag_listener("checkout.new_flow");
//!
//!     let theme = bridge.call("stringVariationFallback", &[json!("ui.theme"), json!("light")]).await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{}: {}", event.topic(), event.body());
//!     }
//!     Ok(())
//! }
//! ```

mod bridge;
mod channel;
mod dispatch;
mod engine;
mod host;
mod memory;
mod registry;

pub use bridge::{FlagBridge, FlagBridgeBuilder};
pub use channel::{EventChannel, DEFAULT_EVENT_CAPACITY};
pub use dispatch::{Variation, VariationDispatcher, VariationRequest};
pub use engine::{ConnectionModeHandler, FlagChangeHandler, FlagEngine, SharedFlagEngine};
pub use host::HostMethod;
pub use memory::{InMemoryEngine, StoredFlag};
pub use registry::{ListenerRegistration, ObserverRegistry};

// Re-export core types for convenience
pub use loom_flags_bridge_core::{
	codec, BridgeConfig, BridgeError, BridgeEvent, ConnectionInformation, ConnectionMode,
	EvaluationDetail, EvaluationErrorKind, EvaluationReason, FlagValue, Identity, ListenerKind,
	ObserverToken, Result, Topic, TrackEvent, ValueKind, VariationType,
};
