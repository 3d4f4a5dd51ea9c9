// crates/callgate-http/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for dispatch and CSRF decisions.
// Purpose: Emit JSON-line audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit event payloads and sinks for the gateway. Every security decision
//! and every handled dispatch produces one JSON line, so deployments can route
//! events to their preferred log pipeline. Cookie and token values are never
//! recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use callgate_core::CallTarget;
use serde::Serialize;

use crate::telemetry::DispatchResult;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Security audit event classification.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// `Origin` header named a different site.
    OriginMismatch,
    /// CSRF cookie was absent.
    MissingCsrfCookie,
    /// CSRF cookie matched neither the session nor a valid signed token.
    InvalidCsrfToken,
    /// CSRF cookie was a genuine signed token for a session that is gone.
    GraceToken,
    /// Route could not be decoded.
    MalformedRoute,
}

impl SecurityEventKind {
    /// Returns a stable label for the event kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OriginMismatch => "origin_mismatch",
            Self::MissingCsrfCookie => "missing_csrf_cookie",
            Self::InvalidCsrfToken => "invalid_csrf_token",
            Self::GraceToken => "grace_token",
            Self::MalformedRoute => "malformed_route",
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Dispatch audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Decoded target (`Class.method`) when available.
    pub target: Option<String>,
    /// Dispatch result.
    pub result: DispatchResult,
    /// HTTP status when the request was handled.
    pub status: Option<u16>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Security audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Security event kind.
    pub kind: SecurityEventKind,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Offending `Origin` header value, when relevant.
    pub origin: Option<String>,
    /// Optional detail message.
    pub message: Option<String>,
}

/// Access denial audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AccessAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Denied target (`Class.method`).
    pub target: String,
}

/// Inputs required to construct a dispatch audit event.
pub struct DispatchAuditEventParams {
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Decoded target when available.
    pub target: Option<CallTarget>,
    /// Dispatch result.
    pub result: DispatchResult,
    /// HTTP status when the request was handled.
    pub status: Option<u16>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Inputs required to construct a security audit event.
pub struct SecurityAuditEventParams {
    /// Security event kind.
    pub kind: SecurityEventKind,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Offending `Origin` header value, when relevant.
    pub origin: Option<String>,
    /// Optional detail message.
    pub message: Option<String>,
}

impl DispatchAuditEvent {
    /// Creates a new dispatch audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: DispatchAuditEventParams) -> Self {
        Self {
            event: "dispatch_request",
            timestamp_ms: now_ms(),
            peer_ip: params.peer_ip,
            target: params.target.map(|target| target.to_string()),
            result: params.result,
            status: params.status,
            error_kind: params.error_kind,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        }
    }
}

impl SecurityAuditEvent {
    /// Creates a new security audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: SecurityAuditEventParams) -> Self {
        Self {
            event: "security_audit",
            timestamp_ms: now_ms(),
            kind: params.kind,
            peer_ip: params.peer_ip,
            origin: params.origin,
            message: params.message,
        }
    }
}

impl AccessAuditEvent {
    /// Creates a new access denial event with a consistent timestamp.
    #[must_use]
    pub fn new(peer_ip: Option<String>, target: &CallTarget) -> Self {
        Self {
            event: "dispatch_denied",
            timestamp_ms: now_ms(),
            peer_ip,
            target: target.to_string(),
        }
    }
}

/// Returns the current time in milliseconds since epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gateway events.
pub trait AuditSink: Send + Sync {
    /// Record a dispatch audit event.
    fn record(&self, event: &DispatchAuditEvent);

    /// Record a security audit event.
    fn record_security(&self, _event: &SecurityAuditEvent) {}

    /// Record an access denial event.
    fn record_access(&self, _event: &AccessAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        write_stderr(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        write_stderr(event);
    }

    fn record_access(&self, event: &AccessAuditEvent) {
        write_stderr(event);
    }
}

/// Writes one JSON line to stderr.
fn write_stderr<T: Serialize>(event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(std::io::stderr(), "{payload}");
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one JSON line to the log file.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        self.write_line(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.write_line(event);
    }

    fn record_access(&self, event: &AccessAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &DispatchAuditEvent) {}

    fn record_security(&self, _event: &SecurityAuditEvent) {}

    fn record_access(&self, _event: &AccessAuditEvent) {}
}
