// crates/callgate-http/tests/dispatcher.rs
// ============================================================================
// Module: Request Dispatcher Tests
// Description: End-to-end dispatch through the security gate and pipeline.
// Purpose: Ensure each failure class maps to one status and no side effects.
// Dependencies: callgate-http, callgate-core
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test-only panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use callgate_core::CallTarget;
use callgate_core::FormPart;
use callgate_core::MultipartForm;
use callgate_http::AllowlistAccess;
use callgate_http::DispatchOutcome;
use callgate_http::GatewayRequest;
use callgate_http::GatewayResponse;
use callgate_http::IssuedSession;
use callgate_http::token::CsrfTokenIssuer;
use callgate_http::token::generate_signing_key;
use serde_json::json;

use crate::common::Fixture;
use crate::common::ORIGIN;
use crate::common::fixture;
use crate::common::route;

fn authed(session: &IssuedSession, route: String) -> GatewayRequest {
    GatewayRequest::new(route)
        .with_origin(ORIGIN)
        .with_cookie("CALLGATE-SESSION", session.session_id.clone())
        .with_cookie("CSRF-TOKEN", session.csrf_token.clone())
}

fn handled(fixture: &Fixture, request: &GatewayRequest) -> GatewayResponse {
    match fixture.dispatcher.dispatch(request) {
        DispatchOutcome::Handled(response) => response,
        DispatchOutcome::NotHandled => panic!("expected a handled response"),
    }
}

fn assert_cors(response: &GatewayResponse) {
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some(ORIGIN));
    assert_eq!(response.header("Vary"), Some("Origin"));
}

// ============================================================================
// SECTION: Success Path
// ============================================================================

#[test]
fn greet_returns_success_envelope() {
    let fixture = fixture();
    let session = fixture.open_session();
    let request = authed(&session, route("Greeter", "greet")).with_json(r#"{"name":"Ada"}"#);
    let response = handled(&fixture, &request);
    assert_eq!(response.status, 200);
    assert_eq!(response.body, br#"{"result":"Hello Ada"}"#.to_vec());
    assert_eq!(response.header("Content-Type"), Some("text/json;charset=UTF8"));
    assert_cors(&response);
    assert_eq!(fixture.greeter.calls(), 1);
}

#[test]
fn absent_origin_header_passes() {
    let fixture = fixture();
    let session = fixture.open_session();
    let request = GatewayRequest::new(route("Greeter", "greet"))
        .with_cookie("CALLGATE-SESSION", session.session_id.clone())
        .with_cookie("CSRF-TOKEN", session.csrf_token.clone())
        .with_json(r#"{"name":"Ada"}"#);
    assert_eq!(handled(&fixture, &request).status, 200);
}

#[test]
fn multipart_uploads_bind_to_file_array() {
    let fixture = fixture();
    let session = fixture.open_session();
    let form = MultipartForm::new()
        .with_part(FormPart::new("$args", r#"{"files":"$$$upload:docs"}"#))
        .with_part(FormPart::new("$uploads", r#"{"docs":2}"#))
        .with_part(FormPart::new("docs_file_0", "first").with_file_name("a.txt"))
        .with_part(FormPart::new("docs_file_1", "second").with_file_name("b.txt"));
    let request = authed(&session, route("Greeter", "upload")).with_multipart(form, 64);
    let response = handled(&fixture, &request);
    assert_eq!(response.status, 200);
    assert_eq!(
        response.json().unwrap(),
        json!({"result": {"count": 2, "parts": ["docs_file_0", "docs_file_1"]}})
    );
}

// ============================================================================
// SECTION: Security Gate
// ============================================================================

#[test]
fn missing_cookie_is_forbidden_without_side_effects() {
    let fixture = fixture();
    let request = GatewayRequest::new(route("Greeter", "greet"))
        .with_origin(ORIGIN)
        .with_json(r#"{"name":"Ada"}"#);
    let response = handled(&fixture, &request);
    assert_eq!(response.status, 403);
    assert!(response.body.is_empty());
    assert_cors(&response);
    assert_eq!(fixture.greeter.calls(), 0);
    assert_eq!(fixture.attempts.count(), 0);
    let security = fixture.audit.events("security_audit");
    assert_eq!(security.len(), 1);
    assert_eq!(security[0]["kind"], "missing_csrf_cookie");
}

#[test]
fn origin_mismatch_is_forbidden_and_notified() {
    let fixture = fixture();
    let session = fixture.open_session();
    let request = GatewayRequest::new(route("Greeter", "greet"))
        .with_origin("https://evil.example")
        .with_cookie("CALLGATE-SESSION", session.session_id.clone())
        .with_cookie("CSRF-TOKEN", session.csrf_token.clone())
        .with_json(r#"{"name":"Ada"}"#);
    assert_eq!(handled(&fixture, &request).status, 403);
    assert_eq!(fixture.greeter.calls(), 0);
    let attempts = fixture.attempts.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].origin.as_deref(), Some("https://evil.example"));
}

#[test]
fn forged_token_is_forbidden_and_notified_once() {
    let fixture = fixture();
    let session = fixture.open_session();
    let request = GatewayRequest::new(route("Greeter", "greet"))
        .with_origin(ORIGIN)
        .with_cookie("CALLGATE-SESSION", session.session_id.clone())
        .with_cookie("CSRF-TOKEN", "v1.forged.token")
        .with_json(r#"{"name":"Ada"}"#);
    assert_eq!(handled(&fixture, &request).status, 403);
    assert_eq!(fixture.greeter.calls(), 0);
    assert_eq!(fixture.attempts.count(), 1);
}

#[test]
fn token_signed_by_another_key_is_forbidden() {
    let fixture = fixture();
    let stranger = CsrfTokenIssuer::new(generate_signing_key(), Duration::from_secs(60));
    let request = GatewayRequest::new(route("Greeter", "greet"))
        .with_origin(ORIGIN)
        .with_cookie("CSRF-TOKEN", stranger.issue("other-session").unwrap())
        .with_json(r#"{"name":"Ada"}"#);
    assert_eq!(handled(&fixture, &request).status, 403);
    assert_eq!(fixture.attempts.count(), 1);
}

#[test]
fn genuine_token_without_live_session_requires_refresh() {
    let fixture = fixture();
    let session = fixture.open_session();
    assert!(fixture.sessions.end_session(&session.session_id));
    let request = authed(&session, route("Greeter", "greet")).with_json(r#"{"name":"Ada"}"#);
    let response = handled(&fixture, &request);
    assert_eq!(response.status, 419);
    assert_cors(&response);
    assert_eq!(fixture.greeter.calls(), 0);
    assert_eq!(fixture.attempts.count(), 0);
}

#[test]
fn genuine_token_for_other_session_requires_refresh() {
    let fixture = fixture();
    let first = fixture.open_session();
    let second = fixture.open_session();
    let request = GatewayRequest::new(route("Greeter", "greet"))
        .with_cookie("CALLGATE-SESSION", first.session_id.clone())
        .with_cookie("CSRF-TOKEN", second.csrf_token.clone())
        .with_json(r#"{"name":"Ada"}"#);
    assert_eq!(handled(&fixture, &request).status, 419);
    let claims = fixture.issuer.verifier().verify(&second.csrf_token).unwrap();
    assert_eq!(claims.sub, second.session_id);
}

#[test]
fn expired_signed_token_is_forbidden_and_notified_once() {
    let fixture = fixture();
    let stale = fixture.issuer.issue_at("old-session", 0).unwrap();
    let request = GatewayRequest::new(route("Greeter", "greet"))
        .with_origin(ORIGIN)
        .with_cookie("CSRF-TOKEN", stale)
        .with_json(r#"{"name":"Ada"}"#);
    let response = handled(&fixture, &request);
    assert_eq!(response.status, 403);
    assert!(response.body.is_empty());
    assert_eq!(fixture.attempts.count(), 1);
    assert_eq!(fixture.greeter.calls(), 0);
    let security = fixture.audit.events("security_audit");
    assert_eq!(security.len(), 1);
    assert_eq!(security[0]["kind"], "invalid_csrf_token");
}

#[test]
fn expired_session_cookie_pair_is_forbidden() {
    let fixture = fixture();
    let session = fixture.sessions.open_session_at(0).unwrap();
    let request = authed(&session, route("Greeter", "greet")).with_json(r#"{"name":"Ada"}"#);
    assert_eq!(handled(&fixture, &request).status, 403);
    assert_eq!(fixture.attempts.count(), 1);
    assert_eq!(fixture.greeter.calls(), 0);
    assert!(fixture.sessions.is_empty());
}

// ============================================================================
// SECTION: Routing and Resolution
// ============================================================================

#[test]
fn malformed_route_is_bad_request_and_logged() {
    let fixture = fixture();
    let session = fixture.open_session();
    let response = handled(&fixture, &authed(&session, "jbind:!!!".to_string()));
    assert_eq!(response.status, 400);
    assert_cors(&response);
    let security = fixture.audit.events("security_audit");
    assert_eq!(security[0]["kind"], "malformed_route");
}

#[test]
fn unknown_method_is_not_handled() {
    let fixture = fixture();
    let session = fixture.open_session();
    let request = authed(&session, route("Greeter", "missing")).with_json("{}");
    assert_eq!(fixture.dispatcher.dispatch(&request), DispatchOutcome::NotHandled);
    let dispatches = fixture.audit.events("dispatch_request");
    assert_eq!(dispatches[0]["result"], "not_handled");
    assert_eq!(dispatches[0]["target"], "Greeter.missing");
}

#[test]
fn unknown_class_is_not_handled() {
    let fixture = fixture();
    let session = fixture.open_session();
    let request = authed(&session, route("Nobody", "greet")).with_json("{}");
    assert_eq!(fixture.dispatcher.dispatch(&request), DispatchOutcome::NotHandled);
}

// ============================================================================
// SECTION: Binding, Access, and Invocation Failures
// ============================================================================

#[test]
fn missing_parameter_is_failure_envelope() {
    let fixture = fixture();
    let session = fixture.open_session();
    let response = handled(&fixture, &authed(&session, route("Greeter", "greet")).with_json("{}"));
    assert_eq!(response.status, 500);
    assert_cors(&response);
    let body = response.json().unwrap();
    assert_eq!(body["type"], "MissingParameter");
    assert_eq!(body["details"]["param"], "name");
    assert_eq!(fixture.greeter.calls(), 0);
}

#[test]
fn access_denied_is_forbidden_without_invocation() {
    let fixture = common::fixture_with_access(Arc::new(AllowlistAccess::new([CallTarget::new(
        "Greeter", "fail",
    )])));
    let session = fixture.open_session();
    let request = authed(&session, route("Greeter", "greet")).with_json(r#"{"name":"Ada"}"#);
    let response = handled(&fixture, &request);
    assert_eq!(response.status, 403);
    assert_eq!(fixture.greeter.calls(), 0);
    assert_eq!(fixture.audit.events("dispatch_denied").len(), 1);
}

#[test]
fn target_failure_is_unwrapped_into_envelope() {
    let fixture = fixture();
    let session = fixture.open_session();
    let response = handled(&fixture, &authed(&session, route("Greeter", "fail")).with_json("{}"));
    assert_eq!(response.status, 500);
    let body = response.json().unwrap();
    assert_eq!(body["type"], "IllegalStateException");
    assert_eq!(body["details"]["message"], "boom");
    assert_eq!(fixture.greeter.calls(), 1);
}
