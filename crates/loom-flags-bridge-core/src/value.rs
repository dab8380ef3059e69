// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tagged flag values and the kinds a variation request can expect.
//!
//! Integers and floats are distinct tags here even though most host
//! boundaries carry a single number type. Which tag a request expects is
//! decided by the caller through [`ValueKind`], never guessed from the value.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single evaluated flag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
	/// JSON null.
	Null,
	/// Boolean flag value.
	Bool(bool),
	/// Integer flag value.
	Int(i64),
	/// Floating-point flag value.
	Float(f64),
	/// String flag value.
	String(String),
	/// JSON array; elements may mix tags.
	Array(Vec<FlagValue>),
	/// JSON object; values may mix tags.
	Object(BTreeMap<String, FlagValue>),
}

impl FlagValue {
	/// Returns the tag name used in logs and mismatch errors.
	pub fn tag(&self) -> &'static str {
		match self {
			FlagValue::Null => "null",
			FlagValue::Bool(_) => "bool",
			FlagValue::Int(_) => "int",
			FlagValue::Float(_) => "float",
			FlagValue::String(_) => "string",
			FlagValue::Array(_) => "array",
			FlagValue::Object(_) => "object",
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, FlagValue::Null)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			FlagValue::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			FlagValue::Int(i) => Some(*i),
			_ => None,
		}
	}

	/// Returns the value as a float, widening integers.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			FlagValue::Int(i) => Some(*i as f64),
			FlagValue::Float(f) => Some(*f),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			FlagValue::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns true if this value can satisfy a request for `kind`.
	pub fn conforms_to(&self, kind: ValueKind) -> bool {
		match kind {
			ValueKind::Bool => matches!(self, FlagValue::Bool(_)),
			ValueKind::Int => matches!(self, FlagValue::Int(_)),
			ValueKind::Float | ValueKind::Number => {
				matches!(self, FlagValue::Int(_) | FlagValue::Float(_))
			}
			ValueKind::String => matches!(self, FlagValue::String(_)),
			ValueKind::Array => matches!(self, FlagValue::Array(_)),
			ValueKind::Object => matches!(self, FlagValue::Object(_)),
			ValueKind::Any => true,
		}
	}

	/// Converts this value into the tag `kind` expects.
	///
	/// Returns `None` when the value does not conform. The only actual
	/// conversion is integer to float for [`ValueKind::Float`].
	pub fn coerce(self, kind: ValueKind) -> Option<FlagValue> {
		if !self.conforms_to(kind) {
			return None;
		}
		match (kind, self) {
			(ValueKind::Float, FlagValue::Int(i)) => Some(FlagValue::Float(i as f64)),
			(_, value) => Some(value),
		}
	}
}

impl fmt::Display for FlagValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match serde_json::to_string(self) {
			Ok(s) => f.write_str(&s),
			Err(_) => f.write_str(self.tag()),
		}
	}
}

impl From<bool> for FlagValue {
	fn from(value: bool) -> Self {
		FlagValue::Bool(value)
	}
}

impl From<i64> for FlagValue {
	fn from(value: i64) -> Self {
		FlagValue::Int(value)
	}
}

impl From<f64> for FlagValue {
	fn from(value: f64) -> Self {
		FlagValue::Float(value)
	}
}

impl From<&str> for FlagValue {
	fn from(value: &str) -> Self {
		FlagValue::String(value.to_string())
	}
}

impl From<String> for FlagValue {
	fn from(value: String) -> Self {
		FlagValue::String(value)
	}
}

impl From<Vec<FlagValue>> for FlagValue {
	fn from(value: Vec<FlagValue>) -> Self {
		FlagValue::Array(value)
	}
}

impl From<BTreeMap<String, FlagValue>> for FlagValue {
	fn from(value: BTreeMap<String, FlagValue>) -> Self {
		FlagValue::Object(value)
	}
}

/// The value kind a variation request expects.
///
/// The host surface's JSON variants map onto these as: none to `Any`,
/// number to `Number`, bool to `Bool`, string to `String`, array to `Array`
/// and object to `Object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
	Bool,
	Int,
	Float,
	String,
	/// Any JSON number; integers stay integers.
	Number,
	Array,
	Object,
	/// Any JSON value.
	Any,
}

impl ValueKind {
	pub const ALL: [ValueKind; 8] = [
		ValueKind::Bool,
		ValueKind::Int,
		ValueKind::Float,
		ValueKind::String,
		ValueKind::Number,
		ValueKind::Array,
		ValueKind::Object,
		ValueKind::Any,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			ValueKind::Bool => "bool",
			ValueKind::Int => "int",
			ValueKind::Float => "float",
			ValueKind::String => "string",
			ValueKind::Number => "number",
			ValueKind::Array => "array",
			ValueKind::Object => "object",
			ValueKind::Any => "any",
		}
	}
}

impl fmt::Display for ValueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Rust types that can be requested from a typed variation call.
pub trait VariationType: Sized {
	/// The kind requested from the engine for this type.
	const KIND: ValueKind;

	/// Extracts `Self` from an already-coerced value.
	fn from_flag_value(value: FlagValue) -> Option<Self>;

	fn into_flag_value(self) -> FlagValue;
}

impl VariationType for bool {
	const KIND: ValueKind = ValueKind::Bool;

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		value.as_bool()
	}

	fn into_flag_value(self) -> FlagValue {
		FlagValue::Bool(self)
	}
}

impl VariationType for i64 {
	const KIND: ValueKind = ValueKind::Int;

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		value.as_i64()
	}

	fn into_flag_value(self) -> FlagValue {
		FlagValue::Int(self)
	}
}

impl VariationType for f64 {
	const KIND: ValueKind = ValueKind::Float;

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		value.as_f64()
	}

	fn into_flag_value(self) -> FlagValue {
		FlagValue::Float(self)
	}
}

impl VariationType for String {
	const KIND: ValueKind = ValueKind::String;

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::String(s) => Some(s),
			_ => None,
		}
	}

	fn into_flag_value(self) -> FlagValue {
		FlagValue::String(self)
	}
}

impl VariationType for Vec<FlagValue> {
	const KIND: ValueKind = ValueKind::Array;

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::Array(items) => Some(items),
			_ => None,
		}
	}

	fn into_flag_value(self) -> FlagValue {
		FlagValue::Array(self)
	}
}

impl VariationType for BTreeMap<String, FlagValue> {
	const KIND: ValueKind = ValueKind::Object;

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::Object(map) => Some(map),
			_ => None,
		}
	}

	fn into_flag_value(self) -> FlagValue {
		FlagValue::Object(self)
	}
}

impl VariationType for FlagValue {
	const KIND: ValueKind = ValueKind::Any;

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		Some(value)
	}

	fn into_flag_value(self) -> FlagValue {
		self
	}
}
