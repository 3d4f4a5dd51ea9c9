// crates/callgate-http/src/security.rs
// ============================================================================
// Module: CSRF Security Gate
// Description: Origin and CSRF token checks ahead of every dispatch.
// Purpose: Reject cross-site and forged requests before any callable runs.
// Dependencies: subtle, crate::{audit, request, session, token}
// ============================================================================

//! ## Overview
//! The gate runs three checks in a fixed order and records progress on a
//! [`SecurityChecklist`]:
//!
//! 1. **Origin**: an `Origin` header naming a different site stops the check.
//!    An absent header passes.
//! 2. **Cookie presence**: the CSRF cookie must be sent.
//! 3. **Token match**: the cookie must equal the live session's expected
//!    token (constant-time). Otherwise it is verified as a signed token; a
//!    genuine one marks the request as valid but expired, and anything else
//!    is invalid.
//!
//! Origin mismatches and invalid tokens are reported once each to the
//! [`CsrfAttemptSink`]. Every decision other than a clean pass is audited.
//! Security posture: cookies and headers are attacker-controlled; token
//! values never reach audit logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use callgate_config::SecurityConfig;
use subtle::ConstantTimeEq;

use crate::audit::AuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::SecurityAuditEvent;
use crate::audit::SecurityAuditEventParams;
use crate::audit::SecurityEventKind;
use crate::request::GatewayRequest;
use crate::session::SessionTokens;
use crate::token::CsrfTokenVerifier;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// HTTP status for requests refused by the gate.
pub const FORBIDDEN_STATUS: u16 = 403;
/// HTTP status telling the client to refresh an expired CSRF token.
pub const REFRESH_REQUIRED_STATUS: u16 = 419;

// ============================================================================
// SECTION: Checklist
// ============================================================================

/// Progress through the security checks for one request.
///
/// # Invariants
/// - Flags only ever move from `false` to `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecurityChecklist {
    /// `Origin` header absent or matching.
    origin_check: bool,
    /// CSRF cookie sent.
    csrf_token_present: bool,
    /// CSRF cookie matched the session or verified as a signed token.
    csrf_token_valid: bool,
    /// CSRF cookie was a genuine signed token rather than the live session's.
    csrf_token_expired: bool,
}

impl SecurityChecklist {
    /// Creates a checklist with every flag cleared.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            origin_check: false,
            csrf_token_present: false,
            csrf_token_valid: false,
            csrf_token_expired: false,
        }
    }

    /// Records a passing origin check.
    pub const fn pass_origin(&mut self) {
        self.origin_check = true;
    }

    /// Records that the CSRF cookie was sent.
    pub const fn mark_present(&mut self) {
        self.csrf_token_present = true;
    }

    /// Records a valid CSRF token.
    pub const fn mark_valid(&mut self) {
        self.csrf_token_valid = true;
    }

    /// Records that the token is genuine but no longer current.
    pub const fn mark_expired(&mut self) {
        self.csrf_token_expired = true;
    }

    /// Returns `true` when the origin check passed.
    #[must_use]
    pub const fn origin_check(&self) -> bool {
        self.origin_check
    }

    /// Returns `true` when the CSRF cookie was sent.
    #[must_use]
    pub const fn csrf_token_present(&self) -> bool {
        self.csrf_token_present
    }

    /// Returns `true` when the CSRF token was accepted.
    #[must_use]
    pub const fn csrf_token_valid(&self) -> bool {
        self.csrf_token_valid
    }

    /// Returns `true` when the token took the grace path.
    #[must_use]
    pub const fn csrf_token_expired(&self) -> bool {
        self.csrf_token_expired
    }

    /// Derives the single outcome for this checklist.
    #[must_use]
    pub const fn verdict(&self) -> SecurityVerdict {
        if !self.origin_check || !self.csrf_token_present || !self.csrf_token_valid {
            SecurityVerdict::Forbidden
        } else if self.csrf_token_expired {
            SecurityVerdict::RefreshRequired
        } else {
            SecurityVerdict::Pass
        }
    }
}

/// Outcome of the security gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityVerdict {
    /// Request may proceed to dispatch.
    Pass,
    /// Request refused (403).
    Forbidden,
    /// Token genuine but stale; client must refresh (419).
    RefreshRequired,
}

impl SecurityVerdict {
    /// Returns the rejection status, or `None` for a pass.
    #[must_use]
    pub const fn rejection_status(self) -> Option<u16> {
        match self {
            Self::Pass => None,
            Self::Forbidden => Some(FORBIDDEN_STATUS),
            Self::RefreshRequired => Some(REFRESH_REQUIRED_STATUS),
        }
    }
}

// ============================================================================
// SECTION: Cross-Site Attempt Notification
// ============================================================================

/// Detected cross-site request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfAttempt {
    /// What was detected.
    pub kind: SecurityEventKind,
    /// Offending `Origin` header, when relevant.
    pub origin: Option<String>,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
}

/// Receiver for detected cross-site request attempts.
pub trait CsrfAttemptSink: Send + Sync {
    /// Handles one detected attempt.
    fn csrf_attempt(&self, attempt: &CsrfAttempt);
}

/// Attempt sink that discards notifications.
pub struct NoopCsrfAttemptSink;

impl CsrfAttemptSink for NoopCsrfAttemptSink {
    fn csrf_attempt(&self, _attempt: &CsrfAttempt) {}
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Origin and CSRF checks applied to every dispatch.
pub struct SecurityGate {
    /// Configured application origin.
    origin: String,
    /// Name of the CSRF cookie.
    csrf_cookie_name: String,
    /// Name of the session cookie.
    session_cookie_name: String,
    /// Live session lookup.
    sessions: Arc<dyn SessionTokens>,
    /// Signed token verifier.
    verifier: CsrfTokenVerifier,
    /// Cross-site attempt receiver.
    attempts: Arc<dyn CsrfAttemptSink>,
    /// Audit sink for security events.
    audit: Arc<dyn AuditSink>,
}

impl SecurityGate {
    /// Creates a gate using the configured origin and cookie names.
    #[must_use]
    pub fn new(
        config: &SecurityConfig,
        sessions: Arc<dyn SessionTokens>,
        verifier: CsrfTokenVerifier,
    ) -> Self {
        Self {
            origin: config.origin.clone(),
            csrf_cookie_name: config.csrf_cookie_name.clone(),
            session_cookie_name: config.session_cookie_name.clone(),
            sessions,
            verifier,
            attempts: Arc::new(NoopCsrfAttemptSink),
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Replaces the cross-site attempt receiver.
    #[must_use]
    pub fn with_attempt_sink(mut self, attempts: Arc<dyn CsrfAttemptSink>) -> Self {
        self.attempts = attempts;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the configured application origin.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Runs the checks in order and returns the resulting checklist.
    #[must_use]
    pub fn check(&self, request: &GatewayRequest) -> SecurityChecklist {
        let mut checklist = SecurityChecklist::new();

        if let Some(origin) = request.origin()
            && origin != self.origin
        {
            self.report(request, SecurityEventKind::OriginMismatch, Some(origin), true);
            return checklist;
        }
        checklist.pass_origin();

        let Some(token) = request.cookie(&self.csrf_cookie_name) else {
            self.report(request, SecurityEventKind::MissingCsrfCookie, None, false);
            return checklist;
        };
        checklist.mark_present();

        if self.matches_session(request, token) {
            checklist.mark_valid();
            return checklist;
        }

        if self.verifier.verify(token).is_ok() {
            checklist.mark_valid();
            checklist.mark_expired();
            self.report(request, SecurityEventKind::GraceToken, None, false);
        } else {
            self.report(request, SecurityEventKind::InvalidCsrfToken, None, true);
        }
        checklist
    }

    /// Returns `true` when `token` equals the live session's expected token.
    fn matches_session(&self, request: &GatewayRequest, token: &str) -> bool {
        request
            .cookie(&self.session_cookie_name)
            .and_then(|session_id| self.sessions.expected_csrf_token(session_id))
            .is_some_and(|expected| constant_time_eq(expected.as_bytes(), token.as_bytes()))
    }

    /// Audits a security event and optionally notifies the attempt sink.
    fn report(
        &self,
        request: &GatewayRequest,
        kind: SecurityEventKind,
        origin: Option<&str>,
        notify: bool,
    ) {
        let peer_ip = request.peer_ip();
        self.audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
            kind,
            peer_ip: peer_ip.clone(),
            origin: origin.map(str::to_string),
            message: None,
        }));
        if notify {
            self.attempts.csrf_attempt(&CsrfAttempt {
                kind,
                origin: origin.map(str::to_string),
                peer_ip,
            });
        }
    }
}

/// Compares two byte slices in constant time.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.ct_eq(right).into()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::SecurityChecklist;
    use super::SecurityVerdict;
    use super::constant_time_eq;

    #[test]
    fn empty_checklist_is_forbidden() {
        assert_eq!(SecurityChecklist::new().verdict(), SecurityVerdict::Forbidden);
    }

    #[test]
    fn full_pass_without_expiry_passes() {
        let mut checklist = SecurityChecklist::new();
        checklist.pass_origin();
        checklist.mark_present();
        checklist.mark_valid();
        assert_eq!(checklist.verdict(), SecurityVerdict::Pass);
        assert_eq!(checklist.verdict().rejection_status(), None);
    }

    #[test]
    fn expired_token_requires_refresh() {
        let mut checklist = SecurityChecklist::new();
        checklist.pass_origin();
        checklist.mark_present();
        checklist.mark_valid();
        checklist.mark_expired();
        assert_eq!(checklist.verdict().rejection_status(), Some(419));
    }

    #[test]
    fn expiry_without_validity_is_still_forbidden() {
        let mut checklist = SecurityChecklist::new();
        checklist.pass_origin();
        checklist.mark_present();
        checklist.mark_expired();
        assert_eq!(checklist.verdict().rejection_status(), Some(403));
    }

    #[test]
    fn constant_time_eq_compares_contents_and_length() {
        assert!(constant_time_eq(b"token", b"token"));
        assert!(!constant_time_eq(b"token", b"tokem"));
        assert!(!constant_time_eq(b"token", b"token-longer"));
    }
}
