// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the flags bridge.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced across the host boundary.
///
/// Only configure and identify validation failures reach the host from the
/// client facade itself. The remaining variants come from argument handling
/// in the host call router, or from engines (and are then swallowed).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
	/// Configuration or initial identity could not be built.
	#[error("invalid configuration: {0}")]
	ConfigurationInvalid(String),

	/// Identity could not be built for an identify call.
	#[error("identity could not be built: {0}")]
	IdentifyInvalid(String),

	/// A boundary value had the wrong shape for the field it was passed as.
	#[error("type mismatch for {field}: expected {expected}")]
	TypeMismatch { field: String, expected: String },

	/// A host call omitted a required positional argument.
	#[error("{method} requires argument {index}")]
	MissingArgument { method: String, index: usize },

	/// The host named a method the bridge does not expose.
	#[error("unknown method: {0}")]
	UnknownMethod(String),

	/// The engine has been stopped.
	#[error("client has been shut down")]
	ClientShutdown,

	/// An analytics event was rejected by the engine.
	#[error("analytics event rejected: {0}")]
	TrackingFailed(String),
}

impl BridgeError {
	/// Stable code used when rejecting a host promise.
	pub fn code(&self) -> &'static str {
		match self {
			BridgeError::ConfigurationInvalid(_) => "E_INITIALIZE",
			BridgeError::IdentifyInvalid(_) => "E_IDENTIFY",
			BridgeError::TypeMismatch { .. } => "E_TYPE",
			BridgeError::MissingArgument { .. } => "E_ARGUMENT",
			BridgeError::UnknownMethod(_) => "E_METHOD",
			BridgeError::ClientShutdown => "E_SHUTDOWN",
			BridgeError::TrackingFailed(_) => "E_TRACK",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn validation_errors_use_host_codes() {
		assert_eq!(
			BridgeError::ConfigurationInvalid("missing mobileKey".into()).code(),
			"E_INITIALIZE"
		);
		assert_eq!(BridgeError::IdentifyInvalid("missing key".into()).code(), "E_IDENTIFY");
	}

	#[test]
	fn messages_name_the_cause() {
		let err = BridgeError::IdentifyInvalid("missing field `key`".into());
		assert_eq!(err.to_string(), "identity could not be built: missing field `key`");

		let err = BridgeError::MissingArgument {
			method: "boolVariationFallback".into(),
			index: 1,
		};
		assert_eq!(err.to_string(), "boolVariationFallback requires argument 1");
	}
}
