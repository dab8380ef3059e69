// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Custom analytics events recorded through the bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::FlagValue;

/// A custom event handed to the engine's analytics queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
	/// Event name.
	pub key: String,
	pub data: Option<FlagValue>,
	/// Numeric value used by metric experiments.
	pub metric_value: Option<f64>,
	pub timestamp: DateTime<Utc>,
}

impl TrackEvent {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			data: None,
			metric_value: None,
			timestamp: Utc::now(),
		}
	}

	pub fn with_data(mut self, data: impl Into<FlagValue>) -> Self {
		self.data = Some(data.into());
		self
	}

	pub fn with_metric_value(mut self, metric_value: f64) -> Self {
		self.metric_value = Some(metric_value);
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_sets_optional_parts() {
		let event = TrackEvent::new("purchase").with_data(42i64).with_metric_value(9.99);

		assert_eq!(event.key, "purchase");
		assert_eq!(event.data, Some(FlagValue::Int(42)));
		assert_eq!(event.metric_value, Some(9.99));
	}

	#[test]
	fn serializes_with_camel_case_keys() {
		let event = TrackEvent::new("signup").with_metric_value(1.0);
		let json = serde_json::to_value(&event).unwrap();

		assert_eq!(json["key"], "signup");
		assert_eq!(json["metricValue"], 1.0);
		assert!(json["data"].is_null());
	}
}
