// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed variation dispatch.
//!
//! Every host variation method is one point in the matrix
//! (value kind) x (fallback or not) x (detail or not). All of them go
//! through [`VariationDispatcher::evaluate`], which asks the engine for the
//! flag's raw evaluation and then applies the requested kind and fallback.
//! Lookups only touch already-loaded engine state.
//!
//! Absence is data here, never an error:
//!
//! | Engine state | No fallback | With fallback `v` |
//! |--------------|-------------|-------------------|
//! | value of requested kind | value | value |
//! | value of another kind | null, `WRONG_TYPE` | `v`, `WRONG_TYPE` |
//! | no value | null, `FLAG_NOT_FOUND` | `v`, `FLAG_NOT_FOUND` |

use loom_flags_bridge_core::{
	EvaluationDetail, EvaluationReason, FlagValue, ValueKind, VariationType,
};
use serde_json::Value;
use tracing::debug;

use crate::engine::SharedFlagEngine;

/// One variation request as it arrives from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationRequest {
	pub flag_key: String,
	pub kind: ValueKind,
	pub fallback: Option<FlagValue>,
	pub with_detail: bool,
}

impl VariationRequest {
	pub fn new(flag_key: impl Into<String>, kind: ValueKind) -> Self {
		Self {
			flag_key: flag_key.into(),
			kind,
			fallback: None,
			with_detail: false,
		}
	}

	pub fn with_fallback(mut self, fallback: FlagValue) -> Self {
		self.fallback = Some(fallback);
		self
	}

	pub fn detailed(mut self) -> Self {
		self.with_detail = true;
		self
	}
}

/// The answer to a [`VariationRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum Variation {
	/// Plain variation; `None` when there is no value and no fallback.
	Value(Option<FlagValue>),
	/// Detailed variation.
	Detail(EvaluationDetail<FlagValue>),
}

impl Variation {
	pub fn to_boundary(&self) -> Value {
		match self {
			Variation::Value(Some(value)) => loom_flags_bridge_core::codec::encode(value),
			Variation::Value(None) => Value::Null,
			Variation::Detail(detail) => detail.to_boundary(),
		}
	}
}

/// Resolves variation requests against an engine.
#[derive(Clone)]
pub struct VariationDispatcher {
	engine: SharedFlagEngine,
}

impl VariationDispatcher {
	pub fn new(engine: SharedFlagEngine) -> Self {
		Self { engine }
	}

	/// Evaluates one point of the host variation matrix.
	pub fn evaluate(&self, request: &VariationRequest) -> Variation {
		let detail = self.resolve(&request.flag_key, request.kind, request.fallback.clone());
		if request.with_detail {
			Variation::Detail(detail)
		} else {
			Variation::Value(detail.value)
		}
	}

	/// Returns the flag's value as `T`, or `fallback`.
	pub fn variation<T: VariationType>(&self, flag_key: &str, fallback: T) -> T {
		self.try_variation(flag_key).unwrap_or(fallback)
	}

	/// Returns the flag's value as `T`, or `None` when it has no such value.
	pub fn try_variation<T: VariationType>(&self, flag_key: &str) -> Option<T> {
		self.resolve(flag_key, T::KIND, None)
			.value
			.and_then(T::from_flag_value)
	}

	/// Detailed evaluation as `T`.
	pub fn variation_detail<T: VariationType>(
		&self,
		flag_key: &str,
		fallback: Option<T>,
	) -> EvaluationDetail<T> {
		self.resolve(flag_key, T::KIND, fallback.map(T::into_flag_value))
			.map(T::from_flag_value)
	}

	fn resolve(
		&self,
		flag_key: &str,
		kind: ValueKind,
		fallback: Option<FlagValue>,
	) -> EvaluationDetail<FlagValue> {
		let EvaluationDetail {
			value,
			variation_index,
			reason,
		} = self.engine.evaluate(flag_key);

		match value {
			Some(value) => {
				let found = value.tag();
				match value.coerce(kind) {
					Some(value) => EvaluationDetail {
						value: Some(value),
						variation_index,
						reason,
					},
					None => {
						debug!(flag_key, %kind, found, "Flag value has the wrong type");
						substitute(fallback, EvaluationReason::wrong_type())
					}
				}
			}
			None => {
				let reason = reason
					.filter(EvaluationReason::is_error)
					.unwrap_or_else(EvaluationReason::flag_not_found);
				debug!(flag_key, %kind, ?reason, "Flag has no value");
				substitute(fallback, reason)
			}
		}
	}
}

fn substitute(fallback: Option<FlagValue>, reason: EvaluationReason) -> EvaluationDetail<FlagValue> {
	EvaluationDetail {
		value: fallback,
		variation_index: None,
		reason: Some(reason),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;
	use std::sync::Arc;

	use crate::engine::MockFlagEngine;
	use loom_flags_bridge_core::EvaluationErrorKind;
	use serde_json::json;

	fn dispatcher_with(flags: BTreeMap<String, (FlagValue, u32)>) -> VariationDispatcher {
		let mut engine = MockFlagEngine::new();
		engine.expect_evaluate().returning(move |key| match flags.get(key) {
			Some((value, index)) => {
				EvaluationDetail::new(value.clone(), Some(*index), EvaluationReason::Fallthrough)
			}
			None => EvaluationDetail::absent(EvaluationReason::flag_not_found()),
		});
		VariationDispatcher::new(Arc::new(engine))
	}

	fn sample() -> VariationDispatcher {
		dispatcher_with(BTreeMap::from([
			("bool.flag".to_string(), (FlagValue::Bool(true), 0)),
			("int.flag".to_string(), (FlagValue::Int(7), 1)),
			("float.flag".to_string(), (FlagValue::Float(0.25), 2)),
			("string.flag".to_string(), (FlagValue::from("blue"), 3)),
			(
				"json.flag".to_string(),
				(
					FlagValue::Object(BTreeMap::from([("limit".to_string(), FlagValue::Int(5))])),
					4,
				),
			),
		]))
	}

	#[test]
	fn unset_flag_without_fallback_is_null_for_every_kind() {
		let dispatcher = sample();
		for kind in ValueKind::ALL {
			let result = dispatcher.evaluate(&VariationRequest::new("missing", kind));
			assert_eq!(result, Variation::Value(None), "kind {kind}");
			assert_eq!(result.to_boundary(), Value::Null);
		}
	}

	#[test]
	fn unset_flag_with_fallback_returns_fallback() {
		let dispatcher = sample();
		let cases = [
			(ValueKind::Bool, FlagValue::Bool(false)),
			(ValueKind::Int, FlagValue::Int(3)),
			(ValueKind::Float, FlagValue::Float(1.5)),
			(ValueKind::String, FlagValue::from("red")),
			(ValueKind::Number, FlagValue::Int(9)),
			(ValueKind::Array, FlagValue::Array(vec![FlagValue::Int(1)])),
			(ValueKind::Object, FlagValue::Object(BTreeMap::new())),
		];

		for (kind, fallback) in cases {
			let request = VariationRequest::new("missing", kind).with_fallback(fallback.clone());
			assert_eq!(dispatcher.evaluate(&request), Variation::Value(Some(fallback.clone())));

			let detail = dispatcher.evaluate(&request.detailed());
			assert_eq!(
				detail,
				Variation::Detail(EvaluationDetail {
					value: Some(fallback),
					variation_index: None,
					reason: Some(EvaluationReason::flag_not_found()),
				})
			);
		}
	}

	#[test]
	fn detail_without_fallback_keeps_three_fields() {
		let dispatcher = sample();
		let result = dispatcher.evaluate(&VariationRequest::new("missing", ValueKind::Bool).detailed());

		assert_eq!(
			result.to_boundary(),
			json!({
				"value": null,
				"variationIndex": null,
				"reason": { "kind": "ERROR", "errorKind": "FLAG_NOT_FOUND" }
			})
		);
	}

	#[test]
	fn matching_value_carries_index_and_reason() {
		let dispatcher = sample();
		let result = dispatcher.evaluate(
			&VariationRequest::new("string.flag", ValueKind::String)
				.with_fallback(FlagValue::from("red"))
				.detailed(),
		);

		assert_eq!(
			result,
			Variation::Detail(EvaluationDetail::new(
				FlagValue::from("blue"),
				Some(3),
				EvaluationReason::Fallthrough
			))
		);
	}

	#[test]
	fn wrong_type_falls_back_with_wrong_type_reason() {
		let dispatcher = sample();
		let result = dispatcher.evaluate(
			&VariationRequest::new("string.flag", ValueKind::Bool)
				.with_fallback(FlagValue::Bool(false))
				.detailed(),
		);

		let Variation::Detail(detail) = result else {
			panic!("expected detail");
		};
		assert_eq!(detail.value, Some(FlagValue::Bool(false)));
		assert_eq!(detail.variation_index, None);
		assert_eq!(
			detail.reason,
			Some(EvaluationReason::Error {
				error_kind: EvaluationErrorKind::WrongType
			})
		);
	}

	#[test]
	fn wrong_type_without_fallback_is_null() {
		let dispatcher = sample();
		assert_eq!(
			dispatcher.evaluate(&VariationRequest::new("int.flag", ValueKind::String)),
			Variation::Value(None)
		);
	}

	#[test]
	fn float_request_widens_integer_flag() {
		let dispatcher = sample();
		assert_eq!(dispatcher.variation("int.flag", 0.0f64), 7.0);
		assert_eq!(
			dispatcher.evaluate(&VariationRequest::new("int.flag", ValueKind::Number)),
			Variation::Value(Some(FlagValue::Int(7)))
		);
	}

	#[test]
	fn any_kind_returns_json_values() {
		let dispatcher = sample();
		let result = dispatcher.evaluate(&VariationRequest::new("json.flag", ValueKind::Any));
		assert_eq!(result.to_boundary(), json!({ "limit": 5 }));
	}

	#[test]
	fn typed_entry_points_share_the_same_rules() {
		let dispatcher = sample();

		assert!(dispatcher.variation("bool.flag", false));
		assert_eq!(dispatcher.variation("missing", 11i64), 11);
		assert_eq!(dispatcher.try_variation::<String>("string.flag").as_deref(), Some("blue"));
		assert_eq!(dispatcher.try_variation::<bool>("string.flag"), None);

		let detail = dispatcher.variation_detail("float.flag", Some(1.0f64));
		assert_eq!(detail.value, Some(0.25));
		assert_eq!(detail.variation_index, Some(2));

		let detail = dispatcher.variation_detail::<i64>("missing", None);
		assert_eq!(detail.value, None);
		assert_eq!(detail.reason, Some(EvaluationReason::flag_not_found()));
	}

	#[test]
	fn engine_error_reason_is_preserved() {
		let mut engine = MockFlagEngine::new();
		engine
			.expect_evaluate()
			.returning(|_| EvaluationDetail::absent(EvaluationReason::client_not_ready()));
		let dispatcher = VariationDispatcher::new(Arc::new(engine));

		let detail = dispatcher.variation_detail("any.flag", Some(true));
		assert_eq!(detail.value, Some(true));
		assert_eq!(detail.reason, Some(EvaluationReason::client_not_ready()));
	}
}
