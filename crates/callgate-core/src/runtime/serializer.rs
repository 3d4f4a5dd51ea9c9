// crates/callgate-core/src/runtime/serializer.rs
// ============================================================================
// Module: Result Serializer
// Description: Success and failure JSON envelopes for dispatch responses.
// Purpose: Produce the exact wire bodies returned to RPC clients.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Successful calls serialize to `{result, $invoke?, $root?}` where the
//! side-channel keys appear only when the callable contributed data. Failures
//! serialize to `{type, details}`. Both use [`JSON_CONTENT_TYPE`]; failures
//! always respond 500.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::envelope::CallContext;
use crate::core::error::CallError;
use crate::core::error::RaisedFailure;
use crate::core::error::TargetError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type of every envelope.
pub const JSON_CONTENT_TYPE: &str = "text/json;charset=UTF8";

/// Response key carrying deferred client invocations.
pub const INVOKE_KEY: &str = "$invoke";

/// Response key carrying exported template data.
pub const TEMPLATE_DATA_KEY: &str = "$root";

/// Status of a successful envelope.
pub const SUCCESS_STATUS: u16 = 200;

/// Status of a failure envelope.
pub const FAILURE_STATUS: u16 = 500;

/// Body used when a failure envelope itself cannot be encoded.
const FALLBACK_FAILURE_BODY: &[u8] = br#"{"type":"ResultConversion","details":{}}"#;

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Success envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessEnvelope {
    /// Return value of the call.
    pub result: Value,
    /// Deferred client invocations.
    #[serde(rename = "$invoke", skip_serializing_if = "Map::is_empty")]
    pub invoke: Map<String, Value>,
    /// Exported template data.
    #[serde(rename = "$root", skip_serializing_if = "Map::is_empty")]
    pub root: Map<String, Value>,
}

/// Failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEnvelope {
    /// Failure type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Public failure details.
    pub details: Map<String, Value>,
}

impl From<&CallError> for FailureEnvelope {
    fn from(error: &CallError) -> Self {
        Self {
            kind: error.envelope_type(),
            details: error.details(),
        }
    }
}

/// Encoded response produced by the serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content type header value.
    pub content_type: &'static str,
    /// Response body.
    pub body: Vec<u8>,
}

// ============================================================================
// SECTION: Serializer
// ============================================================================

/// Stateless envelope encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultSerializer;

impl ResultSerializer {
    /// Creates a serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encodes a success envelope from a result and its side channel.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::ResultConversion`] when the envelope cannot be encoded.
    pub fn success(
        &self,
        result: Value,
        context: CallContext,
    ) -> Result<SerializedResponse, CallError> {
        let (invoke, root) = context.into_parts();
        let envelope = SuccessEnvelope {
            result,
            invoke,
            root,
        };
        let body = serde_json::to_vec(&envelope).map_err(|err| CallError::ResultConversion {
            reason: err.to_string(),
        })?;
        Ok(SerializedResponse {
            status: SUCCESS_STATUS,
            content_type: JSON_CONTENT_TYPE,
            body,
        })
    }

    /// Encodes a failure envelope.
    #[must_use]
    pub fn failure(&self, error: &CallError) -> SerializedResponse {
        let body = serde_json::to_vec(&FailureEnvelope::from(error))
            .unwrap_or_else(|_| FALLBACK_FAILURE_BODY.to_vec());
        SerializedResponse {
            status: FAILURE_STATUS,
            content_type: JSON_CONTENT_TYPE,
            body,
        }
    }

    /// Encodes a success envelope, falling back to a failure envelope.
    #[must_use]
    pub fn encode(&self, outcome: Result<(Value, CallContext), CallError>) -> SerializedResponse {
        match outcome.and_then(|(result, context)| self.success(result, context)) {
            Ok(response) => response,
            Err(error) => self.failure(&error),
        }
    }
}

/// Converts a typed return value into a JSON result.
///
/// # Errors
///
/// Returns [`TargetError`] when the value cannot be represented as JSON.
pub fn serialize_result<T: Serialize>(value: &T) -> Result<Value, TargetError> {
    serde_json::to_value(value).map_err(|err| {
        TargetError::Raised(RaisedFailure::new("ResultConversionException", err.to_string()))
    })
}
