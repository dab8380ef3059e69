// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration supplied by the host at configure time.
//!
//! The host passes a loosely typed dictionary; [`BridgeConfig::from_value`]
//! validates it and the accessors apply defaults, so the rest of the bridge
//! never looks at raw keys.

use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

pub const DEFAULT_EVENTS_CAPACITY: usize = 100;
pub const DEFAULT_EVENTS_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_BACKGROUND_POLLING_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Engine configuration in host key naming.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
	/// Mobile SDK key. Required.
	pub mobile_key: String,
	pub base_uri: Option<String>,
	pub events_uri: Option<String>,
	pub stream_uri: Option<String>,
	/// Maximum number of analytics events held before the oldest are dropped.
	#[serde(default, deserialize_with = "deserialize_capacity")]
	pub events_capacity: Option<usize>,
	pub events_flush_interval_millis: Option<f64>,
	pub connection_timeout_millis: Option<f64>,
	pub polling_interval_millis: Option<f64>,
	pub background_polling_interval_millis: Option<f64>,
	pub use_report: Option<bool>,
	/// Stream updates (true) or poll for them (false).
	pub stream: Option<bool>,
	pub disable_background_updating: Option<bool>,
	/// Start without connecting.
	pub offline: Option<bool>,
	pub debug_mode: Option<bool>,
	pub evaluation_reasons: Option<bool>,
}

impl BridgeConfig {
	pub fn new(mobile_key: impl Into<String>) -> Self {
		Self {
			mobile_key: mobile_key.into(),
			..Default::default()
		}
	}

	/// Builds a configuration from a host dictionary.
	///
	/// Fails with [`BridgeError::ConfigurationInvalid`] when the input is not
	/// an object, `mobileKey` is missing or not a string, or any optional
	/// field has the wrong type.
	pub fn from_value(value: &Value) -> Result<Self> {
		let Some(map) = value.as_object() else {
			return Err(BridgeError::ConfigurationInvalid(
				"configuration must be an object".to_string(),
			));
		};

		match map.get("mobileKey") {
			Some(Value::String(_)) => {}
			Some(_) => {
				let mismatch = BridgeError::TypeMismatch {
					field: "mobileKey".to_string(),
					expected: "string".to_string(),
				};
				return Err(BridgeError::ConfigurationInvalid(mismatch.to_string()));
			}
			None => {
				return Err(BridgeError::ConfigurationInvalid(
					"mobileKey is required".to_string(),
				))
			}
		}

		BridgeConfig::deserialize(value).map_err(|e| BridgeError::ConfigurationInvalid(e.to_string()))
	}

	pub fn with_offline(mut self, offline: bool) -> Self {
		self.offline = Some(offline);
		self
	}

	pub fn with_stream(mut self, stream: bool) -> Self {
		self.stream = Some(stream);
		self
	}

	pub fn with_events_capacity(mut self, capacity: usize) -> Self {
		self.events_capacity = Some(capacity);
		self
	}

	pub fn with_disable_background_updating(mut self, disable: bool) -> Self {
		self.disable_background_updating = Some(disable);
		self
	}

	pub fn events_capacity(&self) -> usize {
		self.events_capacity.unwrap_or(DEFAULT_EVENTS_CAPACITY)
	}

	pub fn events_flush_interval(&self) -> Duration {
		millis(self.events_flush_interval_millis).unwrap_or(DEFAULT_EVENTS_FLUSH_INTERVAL)
	}

	pub fn connection_timeout(&self) -> Duration {
		millis(self.connection_timeout_millis).unwrap_or(DEFAULT_CONNECTION_TIMEOUT)
	}

	pub fn polling_interval(&self) -> Duration {
		millis(self.polling_interval_millis).unwrap_or(DEFAULT_POLLING_INTERVAL)
	}

	pub fn background_polling_interval(&self) -> Duration {
		millis(self.background_polling_interval_millis).unwrap_or(DEFAULT_BACKGROUND_POLLING_INTERVAL)
	}

	pub fn streaming(&self) -> bool {
		self.stream.unwrap_or(true)
	}

	pub fn start_online(&self) -> bool {
		!self.offline.unwrap_or(false)
	}

	pub fn background_updating_disabled(&self) -> bool {
		self.disable_background_updating.unwrap_or(false)
	}

	pub fn evaluation_reasons(&self) -> bool {
		self.evaluation_reasons.unwrap_or(false)
	}

	pub fn use_report(&self) -> bool {
		self.use_report.unwrap_or(false)
	}

	pub fn debug_mode(&self) -> bool {
		self.debug_mode.unwrap_or(false)
	}
}

fn millis(value: Option<f64>) -> Option<Duration> {
	value
		.filter(|ms| *ms >= 0.0)
		.and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
}

/// Accepts integral floats as well as integers; some hosts send every
/// number as a double.
fn deserialize_capacity<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
	D: Deserializer<'de>,
{
	let Some(raw) = Option::<Value>::deserialize(deserializer)? else {
		return Ok(None);
	};
	let capacity = match &raw {
		Value::Number(n) => n.as_u64().or_else(|| {
			n.as_f64()
				.filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
				.map(|f| f as u64)
		}),
		_ => None,
	};
	capacity
		.and_then(|c| usize::try_from(c).ok())
		.map(Some)
		.ok_or_else(|| D::Error::custom(format!("eventsCapacity must be a non-negative integer, got {raw}")))
}
