// crates/callgate-core/src/core/route.rs
// ============================================================================
// Module: Route Decoding
// Description: Prefix + base64 route codec for callable targets.
// Purpose: Turn a raw request route into a (class, method) pair.
// Dependencies: base64, thiserror
// ============================================================================

//! ## Overview
//! Routes take the form `<prefix><base64("Class/method")>`. Decoding strips
//! the prefix, decodes the remainder with the standard alphabet (padding
//! optional), and splits on the first `/`. Decoding is pure and never panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::GeneralPurpose;
use base64::engine::GeneralPurposeConfig;
use thiserror::Error;

use crate::core::identifiers::CallTarget;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default route prefix.
pub const DEFAULT_ROUTE_PREFIX: &str = "jbind:";

/// Separator between class and method in the decoded route.
pub const ROUTE_SEPARATOR: char = '/';

/// Maximum encoded route length accepted by the decoder.
pub const MAX_ROUTE_LENGTH: usize = 4096;

/// Standard-alphabet engine that accepts padded and unpadded input.
const ROUTE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Route decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Route does not start with the configured prefix.
    #[error("route does not start with prefix {0}")]
    MissingPrefix(String),
    /// Route exceeds the maximum length.
    #[error("route exceeds {MAX_ROUTE_LENGTH} bytes")]
    TooLong,
    /// Encoded segment is not valid base64.
    #[error("route is not valid base64: {0}")]
    InvalidEncoding(String),
    /// Decoded bytes are not UTF-8.
    #[error("decoded route is not utf-8")]
    InvalidUtf8,
    /// Decoded route has no class/method separator.
    #[error("decoded route has no separator")]
    MissingSeparator,
    /// Class or method segment is empty.
    #[error("decoded route has an empty segment")]
    EmptySegment,
}

// ============================================================================
// SECTION: Decoder
// ============================================================================

/// Route codec bound to a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecoder {
    /// Route prefix preceding the encoded target.
    prefix: String,
}

impl Default for RouteDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_PREFIX)
    }
}

impl RouteDecoder {
    /// Creates a decoder for the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true when the route carries this decoder's prefix.
    #[must_use]
    pub fn matches(&self, route: &str) -> bool {
        route.trim_start_matches('/').starts_with(&self.prefix)
    }

    /// Decodes a route into a call target.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] when the prefix, encoding, or separator is invalid.
    pub fn decode(&self, route: &str) -> Result<CallTarget, RouteError> {
        if route.len() > MAX_ROUTE_LENGTH {
            return Err(RouteError::TooLong);
        }
        let encoded = route
            .trim_start_matches('/')
            .strip_prefix(&self.prefix)
            .ok_or_else(|| RouteError::MissingPrefix(self.prefix.clone()))?;
        let bytes = ROUTE_ENGINE
            .decode(encoded)
            .map_err(|err| RouteError::InvalidEncoding(err.to_string()))?;
        let decoded = String::from_utf8(bytes).map_err(|_| RouteError::InvalidUtf8)?;
        let (class, method) =
            decoded.split_once(ROUTE_SEPARATOR).ok_or(RouteError::MissingSeparator)?;
        if class.is_empty() || method.is_empty() {
            return Err(RouteError::EmptySegment);
        }
        Ok(CallTarget::new(class, method))
    }

    /// Encodes a call target into a route (padded standard alphabet).
    #[must_use]
    pub fn encode(&self, target: &CallTarget) -> String {
        let raw = format!("{}{ROUTE_SEPARATOR}{}", target.class, target.method);
        format!("{}{}", self.prefix, base64::engine::general_purpose::STANDARD.encode(raw))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

    use super::*;

    #[test]
    fn decode_accepts_leading_slash_and_unpadded_input() {
        let decoder = RouteDecoder::default();
        let target = decoder.decode("/jbind:R3JlZXRlci9ncmVldA").unwrap();
        assert_eq!(target, CallTarget::new("Greeter", "greet"));
    }

    #[test]
    fn decode_splits_on_first_separator_only() {
        let decoder = RouteDecoder::default();
        let route = decoder.encode(&CallTarget::new("Files", "read/all"));
        let target = decoder.decode(&route).unwrap();
        assert_eq!(target.class.as_str(), "Files");
        assert_eq!(target.method.as_str(), "read/all");
    }

    #[test]
    fn decode_rejects_malformed_routes() {
        let decoder = RouteDecoder::default();
        assert!(matches!(decoder.decode("other:abc"), Err(RouteError::MissingPrefix(_))));
        assert!(matches!(decoder.decode("jbind:***"), Err(RouteError::InvalidEncoding(_))));
        assert_eq!(decoder.decode("jbind:R3JlZXRlcg=="), Err(RouteError::MissingSeparator));
        assert_eq!(decoder.decode("jbind:L2dyZWV0"), Err(RouteError::EmptySegment));
        assert_eq!(decoder.decode("jbind:/w=="), Err(RouteError::InvalidUtf8));
    }
}
