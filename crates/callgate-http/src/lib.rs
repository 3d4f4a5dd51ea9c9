// crates/callgate-http/src/lib.rs
// ============================================================================
// Module: Callgate HTTP Library
// Description: Security gate, dispatcher, and axum transport for Callgate.
// Purpose: Serve registered callables over HTTP behind origin and CSRF checks.
// Dependencies: axum, tokio, ed25519-dalek, subtle, callgate-core, callgate-config
// ============================================================================

//! ## Overview
//! `callgate-http` turns a frozen [`callgate_core::CallableRegistry`] into an
//! HTTP endpoint. [`RequestDispatcher`] owns the per-request sequence (route,
//! security gate, resolve, bind, access, pipeline, encode) and
//! [`GatewayServer`] adapts it to axum. Audit and metrics are pluggable sinks.
//! Security posture: requests are untrusted; the gate fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod access;
pub mod audit;
pub mod dispatcher;
pub mod request;
pub mod security;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::AllowAllAccess;
pub use access::AllowlistAccess;
pub use access::policy_from_config;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::SecurityEventKind;
pub use audit::StderrAuditSink;
pub use dispatcher::DispatchOutcome;
pub use dispatcher::GatewayResponse;
pub use dispatcher::RequestDispatcher;
pub use request::GatewayRequest;
pub use request::RequestPayload;
pub use security::CsrfAttempt;
pub use security::CsrfAttemptSink;
pub use security::NoopCsrfAttemptSink;
pub use security::SecurityChecklist;
pub use security::SecurityGate;
pub use security::SecurityVerdict;
pub use server::GatewayServer;
pub use server::ServerError;
pub use session::InMemorySessionStore;
pub use session::IssuedSession;
pub use session::NoSessions;
pub use session::SessionTokens;
pub use telemetry::DispatchMetricEvent;
pub use telemetry::DispatchMetrics;
pub use telemetry::DispatchResult;
pub use telemetry::NoopMetrics;
pub use token::CsrfTokenIssuer;
pub use token::CsrfTokenVerifier;
pub use token::TokenClaims;
pub use token::TokenError;
