// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Conversion between boundary values and [`FlagValue`]s.
//!
//! The boundary side is plain `serde_json::Value`: the only shape that can
//! cross a host bridge. Both directions are total. Requests that need a
//! particular tag go through [`decode_expected`], which reports a
//! [`BridgeError::TypeMismatch`] instead of silently changing the tag.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::error::{BridgeError, Result};
use crate::value::{FlagValue, ValueKind};

/// Encodes a flag value for the boundary.
///
/// Non-finite floats have no JSON form and encode as null.
pub fn encode(value: &FlagValue) -> Value {
	match value {
		FlagValue::Null => Value::Null,
		FlagValue::Bool(b) => Value::Bool(*b),
		FlagValue::Int(i) => Value::Number(Number::from(*i)),
		FlagValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
		FlagValue::String(s) => Value::String(s.clone()),
		FlagValue::Array(items) => Value::Array(items.iter().map(encode).collect()),
		FlagValue::Object(map) => Value::Object(encode_map(map)),
	}
}

/// Encodes a keyed set of values as a boundary object.
pub fn encode_map(map: &BTreeMap<String, FlagValue>) -> Map<String, Value> {
	map.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Decodes a boundary value, using `kind` to pick the numeric tag.
///
/// Numbers decode as [`FlagValue::Float`] for [`ValueKind::Float`], as
/// [`FlagValue::Int`] for [`ValueKind::Int`] when they are integral, and by
/// their JSON representation otherwise. Arrays and objects are converted all
/// the way down, with nested numbers keeping their own representation.
pub fn decode(value: &Value, kind: ValueKind) -> FlagValue {
	match value {
		Value::Null => FlagValue::Null,
		Value::Bool(b) => FlagValue::Bool(*b),
		Value::Number(n) => decode_number(n, kind),
		Value::String(s) => FlagValue::String(s.clone()),
		Value::Array(items) => {
			FlagValue::Array(items.iter().map(|v| decode(v, ValueKind::Any)).collect())
		}
		Value::Object(map) => FlagValue::Object(decode_map(map)),
	}
}

/// Decodes every entry of a boundary object.
pub fn decode_map(map: &Map<String, Value>) -> BTreeMap<String, FlagValue> {
	map.iter()
		.map(|(k, v)| (k.clone(), decode(v, ValueKind::Any)))
		.collect()
}

/// Decodes a boundary value that must satisfy `kind`.
///
/// `field` names the offending input in the error.
pub fn decode_expected(value: &Value, kind: ValueKind, field: &str) -> Result<FlagValue> {
	decode(value, kind)
		.coerce(kind)
		.ok_or_else(|| BridgeError::TypeMismatch {
			field: field.to_string(),
			expected: kind.to_string(),
		})
}

fn decode_number(n: &Number, kind: ValueKind) -> FlagValue {
	if kind == ValueKind::Float {
		return FlagValue::Float(n.as_f64().unwrap_or_default());
	}
	if let Some(i) = n.as_i64() {
		return FlagValue::Int(i);
	}
	let f = n.as_f64().unwrap_or_default();
	if kind == ValueKind::Int && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
		return FlagValue::Int(f as i64);
	}
	FlagValue::Float(f)
}
