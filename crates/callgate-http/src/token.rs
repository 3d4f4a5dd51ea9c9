// crates/callgate-http/src/token.rs
// ============================================================================
// Module: Signed CSRF Tokens
// Description: Issue and verify self-contained ed25519-signed CSRF tokens.
// Purpose: Recognize CSRF cookies that outlived their server-side session.
// Dependencies: base64, ed25519-dalek, rand, serde_json
// ============================================================================

//! ## Overview
//! Every CSRF cookie the gateway hands out is a signed token of the form
//! `v1.<payload>.<signature>`. The payload is base64url JSON claims
//! (`sub`, `iat`, `exp`) and the signature is ed25519 over the ASCII bytes of
//! `v1.<payload>`. While the session is alive the cookie is compared against
//! the session's expected token. Once the session is gone the signature and
//! expiry still let the gate tell a stale-but-genuine token from a forged one.
//!
//! Security posture: tokens are untrusted input; verification uses
//! `verify_strict` and rejects unknown versions before touching the payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version tag leading every issued token.
pub const TOKEN_VERSION: &str = "v1";
/// Maximum accepted token length in bytes.
pub const MAX_TOKEN_LENGTH: usize = 2048;
/// Maximum signing key file size in bytes.
pub const MAX_SIGNING_KEY_BYTES: u64 = 4096;
/// Separator between token segments.
const SEGMENT_SEPARATOR: char = '.';

// ============================================================================
// SECTION: Types
// ============================================================================

/// Claims carried inside a signed CSRF token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Session identifier the token was issued for.
    pub sub: String,
    /// Issue time (seconds since epoch).
    pub iat: u64,
    /// Expiry time (seconds since epoch, exclusive).
    pub exp: u64,
}

/// Errors raised while issuing, verifying, or loading token material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token structure or payload is invalid.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// Token carries an unknown version tag.
    #[error("unsupported token version")]
    UnsupportedVersion,
    /// Signature did not verify against the configured key.
    #[error("token signature verification failed")]
    Signature,
    /// Token expired.
    #[error("token expired")]
    Expired,
    /// Signing key material could not be loaded.
    #[error("signing key error: {0}")]
    Key(String),
}

// ============================================================================
// SECTION: Issuer
// ============================================================================

/// Issues signed CSRF tokens with a fixed lifetime.
pub struct CsrfTokenIssuer {
    /// Key used to sign tokens.
    key: SigningKey,
    /// Token lifetime.
    ttl: Duration,
}

impl CsrfTokenIssuer {
    /// Creates an issuer for the given key and token lifetime.
    #[must_use]
    pub const fn new(key: SigningKey, ttl: Duration) -> Self {
        Self {
            key,
            ttl,
        }
    }

    /// Returns the configured token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a verifier bound to this issuer's public key.
    #[must_use]
    pub fn verifier(&self) -> CsrfTokenVerifier {
        CsrfTokenVerifier::new(self.key.verifying_key())
    }

    /// Issues a token for `subject` valid from now.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when claims cannot be encoded.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, unix_now())
    }

    /// Issues a token for `subject` as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when claims cannot be encoded.
    pub fn issue_at(&self, subject: &str, now: u64) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::Malformed("empty subject".to_string()));
        }
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|err| TokenError::Malformed(format!("claims encoding failed: {err}")))?;
        let signing_input = format!("{TOKEN_VERSION}.{}", URL_SAFE_NO_PAD.encode(payload));
        let signature = self.key.sign(signing_input.as_bytes());
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies signed CSRF tokens against a public key.
#[derive(Debug, Clone)]
pub struct CsrfTokenVerifier {
    /// Public key used to verify signatures.
    key: VerifyingKey,
}

impl CsrfTokenVerifier {
    /// Creates a verifier for the given public key.
    #[must_use]
    pub const fn new(key: VerifyingKey) -> Self {
        Self {
            key,
        }
    }

    /// Verifies `token` against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the token is malformed, forged, or expired.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verifies `token` as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the token is malformed, forged, or expired.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<TokenClaims, TokenError> {
        if token.len() > MAX_TOKEN_LENGTH {
            return Err(TokenError::Malformed("token too long".to_string()));
        }
        let (signing_input, signature_b64) = token
            .rsplit_once(SEGMENT_SEPARATOR)
            .ok_or_else(|| TokenError::Malformed("missing signature segment".to_string()))?;
        let (version, payload_b64) = signing_input
            .split_once(SEGMENT_SEPARATOR)
            .ok_or_else(|| TokenError::Malformed("missing payload segment".to_string()))?;
        if version != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion);
        }
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed("invalid signature encoding".to_string()))?;
        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|_| TokenError::Malformed("invalid signature bytes".to_string()))?;
        self.key
            .verify_strict(signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::Signature)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed("invalid payload encoding".to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|_| TokenError::Malformed("invalid claims".to_string()))?;
        if claims.exp <= claims.iat {
            return Err(TokenError::Malformed("expiry precedes issue time".to_string()));
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

// ============================================================================
// SECTION: Key Material
// ============================================================================

/// Generates a fresh signing key from the operating system RNG.
#[must_use]
pub fn generate_signing_key() -> SigningKey {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed)
}

/// Encodes a signing key seed as standard base64 for storage.
#[must_use]
pub fn encode_signing_key(key: &SigningKey) -> String {
    BASE64.encode(key.to_bytes())
}

/// Loads a signing key from disk (raw 32 bytes or base64 text).
///
/// # Errors
///
/// Returns [`TokenError::Key`] when the file cannot be read or is not a key.
pub fn load_signing_key(path: &Path) -> Result<SigningKey, TokenError> {
    let metadata =
        fs::metadata(path).map_err(|err| TokenError::Key(format!("unable to read key: {err}")))?;
    if metadata.len() > MAX_SIGNING_KEY_BYTES {
        return Err(TokenError::Key("key file exceeds size limit".to_string()));
    }
    let bytes =
        fs::read(path).map_err(|err| TokenError::Key(format!("unable to read key: {err}")))?;
    decode_signing_key(&bytes)
}

/// Decodes signing key material (raw 32 bytes or base64 text).
///
/// # Errors
///
/// Returns [`TokenError::Key`] when the bytes are not a 32-byte seed.
pub fn decode_signing_key(bytes: &[u8]) -> Result<SigningKey, TokenError> {
    if bytes.len() == 32 {
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TokenError::Key("invalid ed25519 signing key".to_string()))?;
        return Ok(SigningKey::from_bytes(&key));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| TokenError::Key("signing key must be utf-8".to_string()))?;
    let decoded = BASE64
        .decode(text.trim().as_bytes())
        .map_err(|_| TokenError::Key("invalid base64 signing key".to_string()))?;
    let key: [u8; 32] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| TokenError::Key("invalid ed25519 signing key".to_string()))?;
    Ok(SigningKey::from_bytes(&key))
}

/// Returns the current time in seconds since epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use std::time::Duration;

    use super::CsrfTokenIssuer;
    use super::TokenError;
    use super::decode_signing_key;
    use super::encode_signing_key;
    use super::generate_signing_key;

    /// Builds an issuer with a fresh key and a one minute lifetime.
    fn issuer() -> CsrfTokenIssuer {
        CsrfTokenIssuer::new(generate_signing_key(), Duration::from_secs(60))
    }

    #[test]
    fn issued_token_verifies_within_lifetime() {
        let issuer = issuer();
        let token = issuer.issue_at("session-1", 1_000).unwrap();
        let claims = issuer.verifier().verify_at(&token, 1_059).unwrap();
        assert_eq!(claims.sub, "session-1");
        assert_eq!(claims.exp, 1_060);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at("session-1", 1_000).unwrap();
        assert_eq!(issuer.verifier().verify_at(&token, 1_060), Err(TokenError::Expired));
    }

    #[test]
    fn token_from_other_key_is_rejected() {
        let token = issuer().issue_at("session-1", 1_000).unwrap();
        assert_eq!(issuer().verifier().verify_at(&token, 1_001), Err(TokenError::Signature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at("session-1", 1_000).unwrap();
        let forged = issuer.issue_at("session-2", 1_000).unwrap();
        let (_, forged_rest) = forged.split_once('.').unwrap();
        let (forged_payload, _) = forged_rest.split_once('.').unwrap();
        let signature = token.rsplit_once('.').unwrap().1;
        let spliced = format!("v1.{forged_payload}.{signature}");
        assert_eq!(issuer.verifier().verify_at(&spliced, 1_001), Err(TokenError::Signature));
    }

    #[test]
    fn unknown_version_and_garbage_are_rejected() {
        let issuer = issuer();
        let verifier = issuer.verifier();
        let token = issuer.issue_at("session-1", 1_000).unwrap();
        let v2 = token.replacen("v1.", "v2.", 1);
        assert_eq!(verifier.verify_at(&v2, 1_001), Err(TokenError::UnsupportedVersion));
        assert!(matches!(verifier.verify_at("not-a-token", 1_001), Err(TokenError::Malformed(_))));
        assert!(matches!(verifier.verify_at("v1.a.b", 1_001), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn signing_key_round_trips_through_base64() {
        let key = generate_signing_key();
        let decoded = decode_signing_key(encode_signing_key(&key).as_bytes()).unwrap();
        assert_eq!(decoded.to_bytes(), key.to_bytes());
        let raw = decode_signing_key(&key.to_bytes()).unwrap();
        assert_eq!(raw.to_bytes(), key.to_bytes());
        assert!(decode_signing_key(b"short").is_err());
    }
}
