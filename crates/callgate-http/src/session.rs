// crates/callgate-http/src/session.rs
// ============================================================================
// Module: Session CSRF Tokens
// Description: Per-session expected CSRF token lookup and an in-memory store.
// Purpose: Give the security gate the token a live session expects.
// Dependencies: rand, crate::token
// ============================================================================

//! ## Overview
//! The security gate compares the CSRF cookie against the token held by the
//! caller's session. [`SessionTokens`] is that lookup; deployments with an
//! external session layer implement it themselves. [`InMemorySessionStore`]
//! opens sessions under random identifiers and stores a signed CSRF token for
//! each, so a cookie that outlives its session can still be recognized by the
//! signature check. A session lives as long as its token; expired entries are
//! evicted whenever a session opens and are never returned by lookups.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::Mutex;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::token::CsrfTokenIssuer;
use crate::token::TokenError;
use crate::token::unix_now;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Random bytes in a generated session identifier.
const SESSION_ID_BYTES: usize = 16;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Looks up the CSRF token a live session expects.
pub trait SessionTokens: Send + Sync {
    /// Returns the expected CSRF token for `session_id`, if the session exists.
    fn expected_csrf_token(&self, session_id: &str) -> Option<String>;
}

/// Session lookup that knows no sessions; every cookie takes the signed path.
pub struct NoSessions;

impl SessionTokens for NoSessions {
    fn expected_csrf_token(&self, _session_id: &str) -> Option<String> {
        None
    }
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Identifier and CSRF token handed to a client when a session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Session identifier (session cookie value).
    pub session_id: String,
    /// CSRF token (CSRF cookie value).
    pub csrf_token: String,
}

/// Process-local session store keyed by session identifier.
pub struct InMemorySessionStore {
    /// Issuer used to sign per-session CSRF tokens.
    issuer: Arc<CsrfTokenIssuer>,
    /// Session identifier to its live entry.
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

/// Stored state of one open session.
struct SessionEntry {
    /// Expected CSRF token.
    csrf_token: String,
    /// Expiry (seconds since epoch, exclusive), matching the token's `exp`.
    expires_at: u64,
}

impl SessionEntry {
    /// Returns true while the session is live at `now`.
    const fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

impl InMemorySessionStore {
    /// Creates an empty store signing tokens with `issuer`.
    #[must_use]
    pub fn new(issuer: Arc<CsrfTokenIssuer>) -> Self {
        Self {
            issuer,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a session under a fresh random identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the token cannot be issued or the store
    /// lock is poisoned.
    pub fn open_session(&self) -> Result<IssuedSession, TokenError> {
        self.open_session_at(unix_now())
    }

    /// Opens a session as if the current time were `now`, evicting every
    /// session that expired by then.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the token cannot be issued or the store
    /// lock is poisoned.
    pub fn open_session_at(&self, now: u64) -> Result<IssuedSession, TokenError> {
        let session_id = random_session_id();
        let csrf_token = self.issuer.issue_at(&session_id, now)?;
        let expires_at = now.saturating_add(self.issuer.ttl().as_secs());
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| TokenError::Key("session store lock poisoned".to_string()))?;
        sessions.retain(|_, entry| entry.is_live(now));
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                csrf_token: csrf_token.clone(),
                expires_at,
            },
        );
        Ok(IssuedSession {
            session_id,
            csrf_token,
        })
    }

    /// Evicts sessions expired at `now`. Returns the number removed.
    pub fn evict_expired_at(&self, now: u64) -> usize {
        self.sessions.lock().map_or(0, |mut sessions| {
            let before = sessions.len();
            sessions.retain(|_, entry| entry.is_live(now));
            before - sessions.len()
        })
    }

    /// Returns the expected token for a session live at `now`.
    fn live_token_at(&self, session_id: &str, now: u64) -> Option<String> {
        self.sessions.lock().ok().and_then(|mut sessions| {
            if sessions.get(session_id).is_some_and(|entry| !entry.is_live(now)) {
                sessions.remove(session_id);
                return None;
            }
            sessions.get(session_id).map(|entry| entry.csrf_token.clone())
        })
    }

    /// Ends a session. Returns `true` when the session existed.
    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.lock().is_ok_and(|mut sessions| sessions.remove(session_id).is_some())
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| sessions.len())
    }

    /// Returns `true` when no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionTokens for InMemorySessionStore {
    fn expected_csrf_token(&self, session_id: &str) -> Option<String> {
        self.live_token_at(session_id, unix_now())
    }
}

/// Generates a hex-encoded random session identifier.
fn random_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(SESSION_ID_BYTES * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
