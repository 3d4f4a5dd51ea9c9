// crates/callgate-http/tests/common/mod.rs
// =============================================================================
// Module: HTTP Test Helpers
// Description: Shared fixtures for dispatcher and server integration tests.
// Purpose: Build a Greeter registry, sessions, and recording sinks once.
// =============================================================================

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test helpers are selectively used across suites."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use callgate_config::GatewayConfig;
use callgate_core::AccessPolicy;
use callgate_core::BoundArguments;
use callgate_core::CallContext;
use callgate_core::CallTarget;
use callgate_core::Callable;
use callgate_core::CallableClass;
use callgate_core::CallableMethod;
use callgate_core::CallableRegistry;
use callgate_core::MethodName;
use callgate_core::ParamSpec;
use callgate_core::ParamType;
use callgate_core::RouteDecoder;
use callgate_core::TargetError;
use callgate_http::AllowAllAccess;
use callgate_http::AuditSink;
use callgate_http::CsrfAttempt;
use callgate_http::CsrfAttemptSink;
use callgate_http::CsrfTokenIssuer;
use callgate_http::InMemorySessionStore;
use callgate_http::IssuedSession;
use callgate_http::RequestDispatcher;
use callgate_http::SecurityGate;
use callgate_http::audit::AccessAuditEvent;
use callgate_http::audit::DispatchAuditEvent;
use callgate_http::audit::SecurityAuditEvent;
use callgate_http::token::generate_signing_key;
use serde_json::Value;
use serde_json::json;

/// Application origin used by every fixture.
pub const ORIGIN: &str = "http://127.0.0.1:8080";

/// Greeter callable counting invocations.
#[derive(Default)]
pub struct Greeter {
    calls: AtomicUsize,
}

impl Greeter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Callable for Greeter {
    fn invoke(
        &self,
        method: &MethodName,
        args: &BoundArguments,
        _ctx: &mut CallContext,
    ) -> Result<Value, TargetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.as_str() {
            "greet" => Ok(json!(format!("Hello {}", args.str("name").unwrap_or_default()))),
            "upload" => {
                let names: Vec<&str> = args
                    .files("files")
                    .unwrap_or_default()
                    .iter()
                    .map(|file| file.part_name())
                    .collect();
                Ok(json!({ "count": names.len(), "parts": names }))
            }
            _ => Err(TargetError::raised("IllegalStateException", "boom").wrap()),
        }
    }
}

/// Attempt sink recording every notification.
#[derive(Default)]
pub struct RecordingAttempts {
    pub attempts: Mutex<Vec<CsrfAttempt>>,
}

impl RecordingAttempts {
    pub fn count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl CsrfAttemptSink for RecordingAttempts {
    fn csrf_attempt(&self, attempt: &CsrfAttempt) {
        self.attempts.lock().unwrap().push(attempt.clone());
    }
}

/// Audit sink keeping serialized events in memory.
#[derive(Default)]
pub struct RecordingAudit {
    pub lines: Mutex<Vec<Value>>,
}

impl RecordingAudit {
    pub fn events(&self, event: &str) -> Vec<Value> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line["event"] == event)
            .cloned()
            .collect()
    }

    fn push<T: serde::Serialize>(&self, event: &T) {
        self.lines.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: &DispatchAuditEvent) {
        self.push(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.push(event);
    }

    fn record_access(&self, event: &AccessAuditEvent) {
        self.push(event);
    }
}

/// Builds a registry holding `Greeter` with `greet`, `upload`, and `fail`.
pub fn greeter_registry(greeter: Arc<Greeter>) -> CallableRegistry {
    let class = CallableClass::new("Greeter", greeter as Arc<dyn Callable>)
        .with_method(
            CallableMethod::new("greet", [ParamSpec::required("name", ParamType::String)])
                .unwrap(),
        )
        .unwrap()
        .with_method(
            CallableMethod::new("upload", [ParamSpec::required("files", ParamType::FileArray)])
                .unwrap(),
        )
        .unwrap()
        .with_method(CallableMethod::new("fail", Vec::<ParamSpec>::new()).unwrap())
        .unwrap();
    let mut builder = CallableRegistry::builder();
    builder.register_callable(class).unwrap();
    builder.freeze()
}

/// Dispatcher plus the collaborators tests inspect.
pub struct Fixture {
    pub dispatcher: RequestDispatcher,
    pub greeter: Arc<Greeter>,
    pub sessions: Arc<InMemorySessionStore>,
    pub issuer: Arc<CsrfTokenIssuer>,
    pub attempts: Arc<RecordingAttempts>,
    pub audit: Arc<RecordingAudit>,
}

impl Fixture {
    pub fn open_session(&self) -> IssuedSession {
        self.sessions.open_session().unwrap()
    }
}

/// Builds a fixture granting every target.
pub fn fixture() -> Fixture {
    fixture_with_access(Arc::new(AllowAllAccess))
}

/// Builds a fixture with the given access policy.
pub fn fixture_with_access(access: Arc<dyn AccessPolicy>) -> Fixture {
    let config = GatewayConfig::default();
    let greeter = Arc::new(Greeter::default());
    let issuer = Arc::new(CsrfTokenIssuer::new(
        generate_signing_key(),
        std::time::Duration::from_secs(config.security.grace_ttl_secs),
    ));
    let sessions = Arc::new(InMemorySessionStore::new(Arc::clone(&issuer)));
    let attempts = Arc::new(RecordingAttempts::default());
    let audit = Arc::new(RecordingAudit::default());
    let gate = SecurityGate::new(&config.security, Arc::clone(&sessions) as _, issuer.verifier())
        .with_attempt_sink(Arc::clone(&attempts) as _)
        .with_audit(Arc::clone(&audit) as _);
    let dispatcher = RequestDispatcher::new(greeter_registry(Arc::clone(&greeter)), gate)
        .with_access_policy(access)
        .with_audit(Arc::clone(&audit) as _);
    Fixture {
        dispatcher,
        greeter,
        sessions,
        issuer,
        attempts,
        audit,
    }
}

/// Encodes the route for `Class.method` with the default prefix.
pub fn route(class: &str, method: &str) -> String {
    RouteDecoder::default().encode(&CallTarget::new(class, method))
}
