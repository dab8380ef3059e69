// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The user/context flags are evaluated for.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::codec;
use crate::error::{BridgeError, Result};
use crate::value::FlagValue;

/// An evaluation identity in host key naming.
///
/// # Example
///
/// ```
/// use loom_flags_bridge_core::Identity;
///
/// let identity = Identity::new("user123")
///     .with_email("someone@example.com")
///     .with_custom("plan", "enterprise");
/// assert_eq!(identity.key, "user123");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	/// Unique key. Required.
	pub key: String,
	pub name: Option<String>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub email: Option<String>,
	pub country: Option<String>,
	pub anonymous: Option<bool>,
	pub private_attribute_names: Option<Vec<String>>,
	#[serde(default, deserialize_with = "deserialize_custom")]
	pub custom: BTreeMap<String, FlagValue>,
}

impl Identity {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			..Default::default()
		}
	}

	/// Builds an identity from a host dictionary.
	///
	/// Fails with [`BridgeError::IdentifyInvalid`] when `key` is missing or
	/// not a string, or an optional field has the wrong type.
	pub fn from_value(value: &Value) -> Result<Self> {
		let Some(map) = value.as_object() else {
			return Err(BridgeError::IdentifyInvalid(
				"identity must be an object".to_string(),
			));
		};

		match map.get("key") {
			Some(Value::String(_)) => {}
			Some(_) => {
				return Err(BridgeError::IdentifyInvalid("key must be a string".to_string()))
			}
			None => return Err(BridgeError::IdentifyInvalid("key is required".to_string())),
		}

		Identity::deserialize(value).map_err(|e| BridgeError::IdentifyInvalid(e.to_string()))
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	pub fn with_anonymous(mut self, anonymous: bool) -> Self {
		self.anonymous = Some(anonymous);
		self
	}

	pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
		self.custom.insert(key.into(), value.into());
		self
	}

	pub fn is_anonymous(&self) -> bool {
		self.anonymous.unwrap_or(false)
	}
}

fn deserialize_custom<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, FlagValue>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
	Ok(raw.map(|map| codec::decode_map(&map)).unwrap_or_default())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn full_identity_is_translated() {
		let identity = Identity::from_value(&json!({
			"key": "user1",
			"name": "Ada",
			"firstName": "Ada",
			"lastName": "Lovelace",
			"email": "ada@example.com",
			"anonymous": false,
			"country": "GB",
			"privateAttributeNames": ["email"],
			"custom": { "plan": "pro", "seats": 5, "beta": { "enabled": true } }
		}))
		.unwrap();

		assert_eq!(identity.key, "user1");
		assert_eq!(identity.last_name.as_deref(), Some("Lovelace"));
		assert_eq!(identity.private_attribute_names, Some(vec!["email".to_string()]));
		assert_eq!(identity.custom["seats"], FlagValue::Int(5));
		assert_eq!(
			identity.custom["beta"],
			FlagValue::Object(BTreeMap::from([("enabled".to_string(), FlagValue::Bool(true))]))
		);
		assert!(!identity.is_anonymous());
	}

	#[test]
	fn missing_key_is_rejected() {
		let err = Identity::from_value(&json!({ "name": "Ada" })).unwrap_err();
		assert_eq!(err.code(), "E_IDENTIFY");
		assert!(err.to_string().contains("key"));
	}

	#[test]
	fn non_string_key_is_rejected() {
		let err = Identity::from_value(&json!({ "key": 17 })).unwrap_err();
		assert!(matches!(err, BridgeError::IdentifyInvalid(_)));
	}

	#[test]
	fn null_custom_is_empty() {
		let identity = Identity::from_value(&json!({ "key": "u", "custom": null })).unwrap();
		assert!(identity.custom.is_empty());
	}
}
