// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single entry point for host bridges.
//!
//! A host binding forwards `(method name, positional JSON arguments)` and
//! gets back one JSON result. Method names follow the host SDK surface:
//!
//! | Family | Names | Arguments | Result |
//! |--------|-------|-----------|--------|
//! | lifecycle | `configure`, `identify` | config, identity / identity | null |
//! | variation | `{bool,int,float,string}Variation[Detail][Fallback]` | flagKey, fallback? | value or detail |
//! | json variation | `jsonVariation[Detail]{None,Number,Bool,String,Array,Object}` | flagKey, fallback (not for `None`) | value or detail |
//! | track | `track[Number,Bool,String,Array,Object][MetricValue]` | eventName, data?, metricValue? | null |
//! | connectivity | `setOffline`, `setOnline`, `close` | | true |
//! | queries | `isOffline`, `allFlags`, `getConnectionInformation`, `isDisableBackgroundPolling` | | value |
//! | listeners | `register*Listener`, `unregister*Listener` | flagKey or listenerId | null |

use std::fmt;
use std::str::FromStr;

use loom_flags_bridge_core::{codec, BridgeError, FlagValue, Result, ValueKind};
use serde_json::Value;
use tracing::debug;

use crate::bridge::FlagBridge;
use crate::dispatch::VariationRequest;

/// A parsed host method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMethod {
	Configure,
	Identify,
	/// `json` marks the `jsonVariation*` spelling; it does not change the
	/// evaluation.
	Variation {
		kind: ValueKind,
		fallback: bool,
		detail: bool,
		json: bool,
	},
	/// `data` is the kind of the optional payload argument.
	Track {
		data: Option<ValueKind>,
		metric_value: bool,
	},
	SetOffline,
	SetOnline,
	IsOffline,
	Close,
	Flush,
	AllFlags,
	RegisterFeatureFlagListener,
	UnregisterFeatureFlagListener,
	RegisterAllFlagsListener,
	UnregisterAllFlagsListener,
	RegisterConnectionModeListener,
	UnregisterConnectionModeListener,
	GetConnectionInformation,
	IsDisableBackgroundPolling,
}

const SCALAR_VARIATIONS: [(&str, ValueKind); 4] = [
	("bool", ValueKind::Bool),
	("int", ValueKind::Int),
	("float", ValueKind::Float),
	("string", ValueKind::String),
];

const JSON_VARIANTS: [(&str, ValueKind); 6] = [
	("None", ValueKind::Any),
	("Number", ValueKind::Number),
	("Bool", ValueKind::Bool),
	("String", ValueKind::String),
	("Array", ValueKind::Array),
	("Object", ValueKind::Object),
];

impl HostMethod {
	/// Number of positional arguments the method reads.
	pub fn arity(&self) -> usize {
		match self {
			HostMethod::Configure => 2,
			HostMethod::Variation { fallback, .. } => 1 + usize::from(*fallback),
			HostMethod::Track { data, metric_value } => {
				1 + usize::from(data.is_some()) + usize::from(*metric_value)
			}
			HostMethod::Identify
			| HostMethod::RegisterFeatureFlagListener
			| HostMethod::UnregisterFeatureFlagListener
			| HostMethod::RegisterAllFlagsListener
			| HostMethod::UnregisterAllFlagsListener
			| HostMethod::RegisterConnectionModeListener
			| HostMethod::UnregisterConnectionModeListener => 1,
			_ => 0,
		}
	}

	fn parse_variation(name: &str) -> Option<HostMethod> {
		for (prefix, kind) in SCALAR_VARIATIONS {
			let Some(rest) = name
				.strip_prefix(prefix)
				.and_then(|rest| rest.strip_prefix("Variation"))
			else {
				continue;
			};
			let (detail, rest) = strip_flag(rest, "Detail");
			let fallback = match rest {
				"" => false,
				"Fallback" => true,
				_ => return None,
			};
			return Some(HostMethod::Variation {
				kind,
				fallback,
				detail,
				json: false,
			});
		}

		let rest = name.strip_prefix("jsonVariation")?;
		let (detail, rest) = strip_flag(rest, "Detail");
		let kind = JSON_VARIANTS
			.iter()
			.find(|(suffix, _)| *suffix == rest)
			.map(|(_, kind)| *kind)?;
		Some(HostMethod::Variation {
			kind,
			fallback: kind != ValueKind::Any,
			detail,
			json: true,
		})
	}

	fn parse_track(name: &str) -> Option<HostMethod> {
		let rest = name.strip_prefix("track")?;
		let (metric_value, rest) = match rest.strip_suffix("MetricValue") {
			Some(rest) => (true, rest),
			None => (false, rest),
		};
		let data = match rest {
			"" => None,
			"Number" => Some(ValueKind::Number),
			"Bool" => Some(ValueKind::Bool),
			"String" => Some(ValueKind::String),
			"Array" => Some(ValueKind::Array),
			"Object" => Some(ValueKind::Object),
			_ => return None,
		};
		Some(HostMethod::Track { data, metric_value })
	}
}

fn strip_flag<'a>(name: &'a str, flag: &str) -> (bool, &'a str) {
	match name.strip_prefix(flag) {
		Some(rest) => (true, rest),
		None => (false, name),
	}
}

impl FromStr for HostMethod {
	type Err = BridgeError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		let method = match s {
			"configure" => HostMethod::Configure,
			"identify" => HostMethod::Identify,
			"setOffline" => HostMethod::SetOffline,
			"setOnline" => HostMethod::SetOnline,
			"isOffline" => HostMethod::IsOffline,
			"close" => HostMethod::Close,
			"flush" => HostMethod::Flush,
			"allFlags" => HostMethod::AllFlags,
			"registerFeatureFlagListener" => HostMethod::RegisterFeatureFlagListener,
			"unregisterFeatureFlagListener" => HostMethod::UnregisterFeatureFlagListener,
			"registerAllFlagsListener" => HostMethod::RegisterAllFlagsListener,
			"unregisterAllFlagsListener" => HostMethod::UnregisterAllFlagsListener,
			"registerCurrentConnectionModeListener" => HostMethod::RegisterConnectionModeListener,
			"unregisterCurrentConnectionModeListener" => {
				HostMethod::UnregisterConnectionModeListener
			}
			"getConnectionInformation" => HostMethod::GetConnectionInformation,
			"isDisableBackgroundPolling" => HostMethod::IsDisableBackgroundPolling,
			other => HostMethod::parse_variation(other)
				.or_else(|| HostMethod::parse_track(other))
				.ok_or_else(|| BridgeError::UnknownMethod(other.to_string()))?,
		};
		Ok(method)
	}
}

impl fmt::Display for HostMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HostMethod::Configure => f.write_str("configure"),
			HostMethod::Identify => f.write_str("identify"),
			HostMethod::Variation {
				kind,
				fallback,
				detail,
				json,
			} => {
				let detail = if *detail { "Detail" } else { "" };
				let scalar = SCALAR_VARIATIONS.iter().find(|(_, k)| k == kind);
				match scalar {
					Some((prefix, _)) if !*json => {
						let fallback = if *fallback { "Fallback" } else { "" };
						write!(f, "{prefix}Variation{detail}{fallback}")
					}
					_ => {
						// JSON variants always take a fallback except `None`.
						let suffix = JSON_VARIANTS
							.iter()
							.find(|(_, k)| k == kind)
							.map(|(suffix, _)| *suffix)
							.unwrap_or("None");
						write!(f, "jsonVariation{detail}{suffix}")
					}
				}
			}
			HostMethod::Track { data, metric_value } => {
				let data = match data {
					Some(ValueKind::Number) => "Number",
					Some(ValueKind::Bool) => "Bool",
					Some(ValueKind::String) => "String",
					Some(ValueKind::Array) => "Array",
					Some(ValueKind::Object) => "Object",
					_ => "",
				};
				let metric = if *metric_value { "MetricValue" } else { "" };
				write!(f, "track{data}{metric}")
			}
			HostMethod::SetOffline => f.write_str("setOffline"),
			HostMethod::SetOnline => f.write_str("setOnline"),
			HostMethod::IsOffline => f.write_str("isOffline"),
			HostMethod::Close => f.write_str("close"),
			HostMethod::Flush => f.write_str("flush"),
			HostMethod::AllFlags => f.write_str("allFlags"),
			HostMethod::RegisterFeatureFlagListener => f.write_str("registerFeatureFlagListener"),
			HostMethod::UnregisterFeatureFlagListener => {
				f.write_str("unregisterFeatureFlagListener")
			}
			HostMethod::RegisterAllFlagsListener => f.write_str("registerAllFlagsListener"),
			HostMethod::UnregisterAllFlagsListener => f.write_str("unregisterAllFlagsListener"),
			HostMethod::RegisterConnectionModeListener => {
				f.write_str("registerCurrentConnectionModeListener")
			}
			HostMethod::UnregisterConnectionModeListener => {
				f.write_str("unregisterCurrentConnectionModeListener")
			}
			HostMethod::GetConnectionInformation => f.write_str("getConnectionInformation"),
			HostMethod::IsDisableBackgroundPolling => f.write_str("isDisableBackgroundPolling"),
		}
	}
}

/// Positional arguments of one host call.
struct Args<'a> {
	method: &'a str,
	values: &'a [Value],
}

impl<'a> Args<'a> {
	fn get(&self, index: usize) -> Result<&'a Value> {
		self.values
			.get(index)
			.ok_or_else(|| BridgeError::MissingArgument {
				method: self.method.to_string(),
				index,
			})
	}

	fn string(&self, index: usize, field: &str) -> Result<&'a str> {
		self.get(index)?
			.as_str()
			.ok_or_else(|| type_mismatch(field, "string"))
	}

	fn number(&self, index: usize, field: &str) -> Result<f64> {
		self.get(index)?
			.as_f64()
			.ok_or_else(|| type_mismatch(field, "number"))
	}

	fn flag_value(&self, index: usize, kind: ValueKind, field: &str) -> Result<FlagValue> {
		codec::decode_expected(self.get(index)?, kind, field)
	}
}

fn type_mismatch(field: &str, expected: &str) -> BridgeError {
	BridgeError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
	}
}

impl FlagBridge {
	/// Runs a host method by name.
	///
	/// Fails with [`BridgeError::UnknownMethod`] for names outside the host
	/// surface, [`BridgeError::MissingArgument`] or
	/// [`BridgeError::TypeMismatch`] for bad arguments, and otherwise with
	/// whatever the underlying operation reports.
	pub async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
		let parsed: HostMethod = method.parse()?;
		let args = Args {
			method,
			values: args,
		};
		debug!(method, args = args.values.len(), "Host call");

		if args.values.len() < parsed.arity() {
			return Err(BridgeError::MissingArgument {
				method: method.to_string(),
				index: args.values.len(),
			});
		}

		match parsed {
			HostMethod::Configure => {
				self.configure(args.get(0)?, args.get(1)?).await?;
				Ok(Value::Null)
			}
			HostMethod::Identify => {
				self.identify(args.get(0)?).await?;
				Ok(Value::Null)
			}
			HostMethod::Variation {
				kind,
				fallback,
				detail,
				..
			} => {
				let mut request = VariationRequest::new(args.string(0, "flagKey")?, kind);
				if fallback {
					request = request.with_fallback(args.flag_value(1, kind, "fallback")?);
				}
				if detail {
					request = request.detailed();
				}
				Ok(self.evaluate(&request).to_boundary())
			}
			HostMethod::Track { data, metric_value } => {
				let event_name = args.string(0, "eventName")?;
				let payload = match data {
					Some(kind) => Some(args.flag_value(1, kind, "data")?),
					None => None,
				};
				let metric = if metric_value {
					Some(args.number(1 + usize::from(data.is_some()), "metricValue")?)
				} else {
					None
				};
				self.track(event_name, payload, metric);
				Ok(Value::Null)
			}
			HostMethod::SetOffline => {
				self.set_offline().await;
				Ok(Value::Bool(true))
			}
			HostMethod::SetOnline => {
				self.set_online(true).await;
				Ok(Value::Bool(true))
			}
			HostMethod::IsOffline => Ok(Value::Bool(self.is_offline())),
			HostMethod::Close => {
				self.close().await;
				Ok(Value::Bool(true))
			}
			HostMethod::Flush => {
				self.flush();
				Ok(Value::Null)
			}
			HostMethod::AllFlags => Ok(Value::Object(codec::encode_map(&self.all_flags()))),
			HostMethod::RegisterFeatureFlagListener => {
				self.register_feature_flag_listener(args.string(0, "flagKey")?);
				Ok(Value::Null)
			}
			HostMethod::UnregisterFeatureFlagListener => {
				self.unregister_feature_flag_listener(args.string(0, "flagKey")?);
				Ok(Value::Null)
			}
			HostMethod::RegisterAllFlagsListener => {
				self.register_all_flags_listener(args.string(0, "listenerId")?);
				Ok(Value::Null)
			}
			HostMethod::UnregisterAllFlagsListener => {
				self.unregister_all_flags_listener(args.string(0, "listenerId")?);
				Ok(Value::Null)
			}
			HostMethod::RegisterConnectionModeListener => {
				self.register_connection_mode_listener(args.string(0, "listenerId")?);
				Ok(Value::Null)
			}
			HostMethod::UnregisterConnectionModeListener => {
				self.unregister_connection_mode_listener(args.string(0, "listenerId")?);
				Ok(Value::Null)
			}
			HostMethod::GetConnectionInformation => Ok(self.connection_information().to_boundary()),
			HostMethod::IsDisableBackgroundPolling => {
				Ok(Value::Bool(self.is_disable_background_polling()))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	use crate::memory::InMemoryEngine;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn parses_scalar_variation_matrix() {
		assert_eq!(
			"boolVariation".parse::<HostMethod>().unwrap(),
			HostMethod::Variation {
				kind: ValueKind::Bool,
				fallback: false,
				detail: false,
				json: false
			}
		);
		assert_eq!(
			"intVariationDetailFallback".parse::<HostMethod>().unwrap(),
			HostMethod::Variation {
				kind: ValueKind::Int,
				fallback: true,
				detail: true,
				json: false
			}
		);
		assert_eq!(
			"floatVariationFallback".parse::<HostMethod>().unwrap(),
			HostMethod::Variation {
				kind: ValueKind::Float,
				fallback: true,
				detail: false,
				json: false
			}
		);
	}

	#[test]
	fn parses_json_variants() {
		assert_eq!(
			"jsonVariationNone".parse::<HostMethod>().unwrap(),
			HostMethod::Variation {
				kind: ValueKind::Any,
				fallback: false,
				detail: false,
				json: true
			}
		);
		assert_eq!(
			"jsonVariationDetailObject".parse::<HostMethod>().unwrap(),
			HostMethod::Variation {
				kind: ValueKind::Object,
				fallback: true,
				detail: true,
				json: true
			}
		);
	}

	#[test]
	fn parses_track_matrix() {
		assert_eq!(
			"track".parse::<HostMethod>().unwrap(),
			HostMethod::Track {
				data: None,
				metric_value: false
			}
		);
		assert_eq!(
			"trackMetricValue".parse::<HostMethod>().unwrap(),
			HostMethod::Track {
				data: None,
				metric_value: true
			}
		);
		assert_eq!(
			"trackArrayMetricValue".parse::<HostMethod>().unwrap(),
			HostMethod::Track {
				data: Some(ValueKind::Array),
				metric_value: true
			}
		);
	}

	#[test]
	fn every_variation_name_prints_back_unchanged() {
		let mut names = Vec::new();
		for scalar in ["bool", "int", "float", "string"] {
			for detail in ["", "Detail"] {
				for fallback in ["", "Fallback"] {
					names.push(format!("{scalar}Variation{detail}{fallback}"));
				}
			}
		}
		for detail in ["", "Detail"] {
			for suffix in ["None", "Number", "Bool", "String", "Array", "Object"] {
				names.push(format!("jsonVariation{detail}{suffix}"));
			}
		}

		for name in names {
			let method: HostMethod = name.parse().unwrap();
			assert_eq!(method.to_string(), name);
		}
	}

	#[test]
	fn json_and_scalar_spellings_evaluate_alike() {
		let json: HostMethod = "jsonVariationBool".parse().unwrap();
		let scalar: HostMethod = "boolVariationFallback".parse().unwrap();
		assert_ne!(json, scalar);

		let (
			HostMethod::Variation {
				kind: json_kind,
				fallback: json_fallback,
				..
			},
			HostMethod::Variation { kind, fallback, .. },
		) = (json, scalar)
		else {
			panic!("expected variation methods");
		};
		assert_eq!((json_kind, json_fallback), (kind, fallback));
		assert_eq!(json.arity(), scalar.arity());
	}

	#[test]
	fn rejects_unknown_names() {
		for name in ["", "boolVariationFoo", "jsonVariationInt", "trackDate", "Close"] {
			let err = name.parse::<HostMethod>().unwrap_err();
			assert_eq!(err.code(), "E_METHOD", "{name}");
		}
	}

	#[test]
	fn arity_counts_positional_arguments() {
		assert_eq!("configure".parse::<HostMethod>().unwrap().arity(), 2);
		assert_eq!("stringVariationDetailFallback".parse::<HostMethod>().unwrap().arity(), 2);
		assert_eq!("jsonVariationDetailNone".parse::<HostMethod>().unwrap().arity(), 1);
		assert_eq!("trackObjectMetricValue".parse::<HostMethod>().unwrap().arity(), 3);
		assert_eq!("flush".parse::<HostMethod>().unwrap().arity(), 0);
	}

	async fn configured_bridge() -> FlagBridge {
		let engine = Arc::new(InMemoryEngine::new());
		engine.load_flags(
			"user1",
			[
				("enabled", FlagValue::Bool(true)),
				("limit", FlagValue::Int(10)),
				("theme", FlagValue::from("dark")),
			],
		);
		let bridge = FlagBridge::builder().engine(engine).build().unwrap();
		bridge
			.call("configure", &[json!({ "mobileKey": "abc" }), json!({ "key": "user1" })])
			.await
			.unwrap();
		bridge
	}

	#[tokio::test]
	async fn variation_calls_return_boundary_values() {
		let bridge = configured_bridge().await;

		assert_eq!(bridge.call("boolVariation", &[json!("enabled")]).await.unwrap(), json!(true));
		assert_eq!(
			bridge.call("floatVariation", &[json!("limit")]).await.unwrap(),
			json!(10.0)
		);
		assert_eq!(
			bridge
				.call("stringVariationFallback", &[json!("missing"), json!("light")])
				.await
				.unwrap(),
			json!("light")
		);
		assert_eq!(
			bridge
				.call("jsonVariationDetailNumber", &[json!("theme"), json!(3)])
				.await
				.unwrap(),
			json!({
				"value": 3,
				"variationIndex": null,
				"reason": { "kind": "ERROR", "errorKind": "WRONG_TYPE" }
			})
		);
	}

	#[tokio::test]
	async fn short_argument_lists_report_first_missing_index() {
		let bridge = configured_bridge().await;

		let err = bridge.call("trackObjectMetricValue", &[json!("cart")]).await.unwrap_err();
		assert_eq!(
			err,
			BridgeError::MissingArgument {
				method: "trackObjectMetricValue".to_string(),
				index: 1
			}
		);

		let err = bridge.call("configure", &[]).await.unwrap_err();
		assert_eq!(err.code(), "E_ARGUMENT");
		assert_eq!(bridge.call("isOffline", &[]).await.unwrap(), json!(false));
	}

	#[tokio::test]
	async fn bad_arguments_are_reported() {
		let bridge = configured_bridge().await;

		let err = bridge.call("boolVariationFallback", &[json!("enabled")]).await.unwrap_err();
		assert_eq!(
			err,
			BridgeError::MissingArgument {
				method: "boolVariationFallback".to_string(),
				index: 1
			}
		);

		let err = bridge
			.call("intVariationFallback", &[json!("limit"), json!("ten")])
			.await
			.unwrap_err();
		assert_eq!(err.code(), "E_TYPE");

		let err = bridge.call("boolVariation", &[json!(1)]).await.unwrap_err();
		assert_eq!(err.code(), "E_TYPE");
	}

	#[tokio::test]
	async fn lifecycle_calls_return_true() {
		let bridge = configured_bridge().await;

		assert_eq!(bridge.call("setOffline", &[]).await.unwrap(), json!(true));
		assert_eq!(bridge.call("isOffline", &[]).await.unwrap(), json!(true));
		assert_eq!(bridge.call("setOnline", &[]).await.unwrap(), json!(true));
		assert_eq!(bridge.call("isOffline", &[]).await.unwrap(), json!(false));
		assert_eq!(bridge.call("close", &[]).await.unwrap(), json!(true));
		assert_eq!(bridge.call("close", &[]).await.unwrap(), json!(true));
	}

	#[tokio::test]
	async fn queries_serialize_for_the_host() {
		let bridge = configured_bridge().await;

		assert_eq!(
			bridge.call("allFlags", &[]).await.unwrap(),
			json!({ "enabled": true, "limit": 10, "theme": "dark" })
		);
		assert_eq!(
			bridge.call("isDisableBackgroundPolling", &[]).await.unwrap(),
			json!(false)
		);
		let info = bridge.call("getConnectionInformation", &[]).await.unwrap();
		assert_eq!(info["currentConnectionMode"], json!("streaming"));
	}

	#[tokio::test]
	async fn track_calls_never_fail_on_engine_errors() {
		let bridge = configured_bridge().await;

		bridge.call("trackNumber", &[json!("purchase"), json!(42)]).await.unwrap();
		bridge
			.call("trackObjectMetricValue", &[json!("cart"), json!({ "items": 2 }), json!(9.5)])
			.await
			.unwrap();
		bridge.call("track", &[json!("")]).await.unwrap();
		bridge.call("flush", &[]).await.unwrap();
	}

	proptest! {
		#[test]
		fn scalar_variation_names_round_trip(
			kind in prop::sample::select(vec![
				ValueKind::Bool,
				ValueKind::Int,
				ValueKind::Float,
				ValueKind::String,
			]),
			fallback in any::<bool>(),
			detail in any::<bool>(),
		) {
			let method = HostMethod::Variation { kind, fallback, detail, json: false };
			prop_assert_eq!(method.to_string().parse::<HostMethod>().unwrap(), method);
		}

		#[test]
		fn json_variation_names_round_trip(
			kind in prop::sample::select(vec![
				ValueKind::Any,
				ValueKind::Number,
				ValueKind::Bool,
				ValueKind::String,
				ValueKind::Array,
				ValueKind::Object,
			]),
			detail in any::<bool>(),
		) {
			let method = HostMethod::Variation {
				kind,
				fallback: kind != ValueKind::Any,
				detail,
				json: true,
			};
			prop_assert_eq!(method.to_string().parse::<HostMethod>().unwrap(), method);
		}

		#[test]
		fn track_names_round_trip(
			data in prop::option::of(prop::sample::select(vec![
				ValueKind::Number,
				ValueKind::Bool,
				ValueKind::String,
				ValueKind::Array,
				ValueKind::Object,
			])),
			metric_value in any::<bool>(),
		) {
			let method = HostMethod::Track { data, metric_value };
			prop_assert_eq!(method.to_string().parse::<HostMethod>().unwrap(), method);
		}
	}
}
