// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation details: a value plus the variation index and reason the
//! engine reported for it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::codec;
use crate::value::FlagValue;

/// Why an evaluation produced its value.
///
/// Engines own the meaning of these; the bridge only creates the
/// [`EvaluationReason::Error`] forms when it has to substitute a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationReason {
	/// The flag is switched off and served its off variation.
	Off,
	/// No targeting matched; the default rule applied.
	Fallthrough,
	/// The context was individually targeted.
	TargetMatch,
	/// A targeting rule matched.
	RuleMatch {
		#[serde(rename = "ruleIndex")]
		rule_index: u32,
		#[serde(rename = "ruleId", default, skip_serializing_if = "Option::is_none")]
		rule_id: Option<String>,
	},
	/// A prerequisite flag did not return the required variation.
	PrerequisiteFailed {
		#[serde(rename = "prerequisiteKey")]
		prerequisite_key: String,
	},
	/// Evaluation could not produce a value.
	Error {
		#[serde(rename = "errorKind")]
		error_kind: EvaluationErrorKind,
	},
}

impl EvaluationReason {
	pub fn flag_not_found() -> Self {
		EvaluationReason::Error {
			error_kind: EvaluationErrorKind::FlagNotFound,
		}
	}

	pub fn wrong_type() -> Self {
		EvaluationReason::Error {
			error_kind: EvaluationErrorKind::WrongType,
		}
	}

	pub fn client_not_ready() -> Self {
		EvaluationReason::Error {
			error_kind: EvaluationErrorKind::ClientNotReady,
		}
	}

	pub fn is_error(&self) -> bool {
		matches!(self, EvaluationReason::Error { .. })
	}

	/// Encodes the reason as a boundary object.
	pub fn to_boundary(&self) -> Value {
		serde_json::to_value(self).unwrap_or_else(|_| json!({ "kind": "ERROR" }))
	}
}

/// The failure behind an [`EvaluationReason::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationErrorKind {
	/// The engine has not loaded flags for the current context yet.
	ClientNotReady,
	/// No flag with this key is loaded.
	FlagNotFound,
	/// The flag exists but its value does not match the requested kind.
	WrongType,
	/// The flag data was malformed.
	MalformedFlag,
	/// Any other engine failure.
	Exception,
}

/// The three-field result of a detailed evaluation.
///
/// `value` and `variation_index` come from the same evaluation. When a
/// fallback was substituted the index is `None` and `reason` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDetail<V = FlagValue> {
	pub value: Option<V>,
	pub variation_index: Option<u32>,
	pub reason: Option<EvaluationReason>,
}

impl<V> EvaluationDetail<V> {
	pub fn new(value: V, variation_index: Option<u32>, reason: EvaluationReason) -> Self {
		Self {
			value: Some(value),
			variation_index,
			reason: Some(reason),
		}
	}

	/// A detail with no value, explained by `reason`.
	pub fn absent(reason: EvaluationReason) -> Self {
		Self {
			value: None,
			variation_index: None,
			reason: Some(reason),
		}
	}

	pub fn map<U>(self, f: impl FnOnce(V) -> Option<U>) -> EvaluationDetail<U> {
		EvaluationDetail {
			value: self.value.and_then(f),
			variation_index: self.variation_index,
			reason: self.reason,
		}
	}
}

impl EvaluationDetail<FlagValue> {
	/// Encodes the detail as `{ value, variationIndex, reason }`.
	///
	/// All three keys are always present; absent parts are null.
	pub fn to_boundary(&self) -> Value {
		json!({
			"value": self.value.as_ref().map(codec::encode).unwrap_or(Value::Null),
			"variationIndex": self.variation_index,
			"reason": self.reason.as_ref().map(EvaluationReason::to_boundary).unwrap_or(Value::Null),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reason_serializes_with_kind_tag() {
		assert_eq!(
			EvaluationReason::flag_not_found().to_boundary(),
			json!({ "kind": "ERROR", "errorKind": "FLAG_NOT_FOUND" })
		);
		assert_eq!(
			EvaluationReason::RuleMatch {
				rule_index: 2,
				rule_id: Some("r-1".to_string())
			}
			.to_boundary(),
			json!({ "kind": "RULE_MATCH", "ruleIndex": 2, "ruleId": "r-1" })
		);
		assert_eq!(EvaluationReason::Fallthrough.to_boundary(), json!({ "kind": "FALLTHROUGH" }));
	}

	#[test]
	fn absent_detail_keeps_all_three_keys() {
		let detail = EvaluationDetail::<FlagValue>::absent(EvaluationReason::flag_not_found());
		let encoded = detail.to_boundary();

		assert_eq!(encoded["value"], Value::Null);
		assert_eq!(encoded["variationIndex"], Value::Null);
		assert_eq!(encoded["reason"]["errorKind"], "FLAG_NOT_FOUND");
		assert_eq!(encoded.as_object().map(|o| o.len()), Some(3));
	}

	#[test]
	fn map_drops_value_when_conversion_fails() {
		let detail = EvaluationDetail::new(FlagValue::Int(1), Some(0), EvaluationReason::Fallthrough);
		let mapped: EvaluationDetail<bool> = detail.map(|v| v.as_bool());

		assert_eq!(mapped.value, None);
		assert_eq!(mapped.variation_index, Some(0));
	}

	#[test]
	fn reason_roundtrips_through_serde() {
		let reason = EvaluationReason::PrerequisiteFailed {
			prerequisite_key: "checkout.enabled".to_string(),
		};
		let json = serde_json::to_string(&reason).unwrap();
		let parsed: EvaluationReason = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, reason);
	}
}
