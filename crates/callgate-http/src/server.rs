// crates/callgate-http/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: axum transport for the request dispatcher.
// Purpose: Serve registered callables over HTTP with CSRF protection.
// Dependencies: axum, tokio, callgate-config, callgate-core
// ============================================================================

//! ## Overview
//! [`GatewayServer`] wires configuration, key material, sessions, audit, and
//! access policy into a [`RequestDispatcher`] and serves it as an axum
//! fallback handler. Routes without the configured prefix and requests no
//! callable handles get 404. Bodies larger than `server.max_body_bytes` get
//! 413 before dispatch. Dispatch is synchronous and runs inside
//! `block_in_place` on the multi-thread runtime.
//! Security posture: every header, cookie, and body is untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::FromRequest;
use axum::extract::Multipart;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::COOKIE;
use axum::http::header::ORIGIN;
use axum::response::IntoResponse;
use axum::response::Response;
use callgate_config::GatewayConfig;
use callgate_core::AccessPolicy;
use callgate_core::CallableRegistry;
use callgate_core::FormPart;
use callgate_core::InvocationPipeline;
use callgate_core::MultipartForm;
use callgate_core::RouteDecoder;
use percent_encoding::percent_decode_str;

use crate::access::policy_from_config;
use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::dispatcher::DispatchOutcome;
use crate::dispatcher::GatewayResponse;
use crate::dispatcher::RequestDispatcher;
use crate::request::GatewayRequest;
use crate::security::CsrfAttemptSink;
use crate::security::NoopCsrfAttemptSink;
use crate::security::SecurityGate;
use crate::session::InMemorySessionStore;
use crate::session::SessionTokens;
use crate::telemetry::DispatchMetrics;
use crate::telemetry::NoopMetrics;
use crate::token::CsrfTokenIssuer;
use crate::token::generate_signing_key;
use crate::token::load_signing_key;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type prefix selecting multipart decoding.
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

// ============================================================================
// SECTION: Gateway Server
// ============================================================================

/// HTTP gateway serving registered callables.
pub struct GatewayServer {
    /// Validated configuration.
    config: GatewayConfig,
    /// Frozen callable registry.
    registry: CallableRegistry,
    /// Signed CSRF token issuer.
    issuer: Arc<CsrfTokenIssuer>,
    /// Live session store.
    sessions: Arc<InMemorySessionStore>,
    /// Access policy.
    access: Arc<dyn AccessPolicy>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Cross-site attempt receiver.
    attempts: Arc<dyn CsrfAttemptSink>,
    /// Metrics sink.
    metrics: Arc<dyn DispatchMetrics>,
    /// Interceptor pipeline.
    pipeline: InvocationPipeline,
}

impl GatewayServer {
    /// Builds a server from configuration and a frozen registry.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the signing
    /// key or audit log cannot be opened.
    pub fn from_config(
        config: GatewayConfig,
        registry: CallableRegistry,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let signing_key = match config.security.signing_key_path.as_deref() {
            Some(path) => load_signing_key(Path::new(path))
                .map_err(|err| ServerError::Init(err.to_string()))?,
            None => generate_signing_key(),
        };
        let issuer = Arc::new(CsrfTokenIssuer::new(
            signing_key,
            Duration::from_secs(config.security.grace_ttl_secs),
        ));
        let sessions = Arc::new(InMemorySessionStore::new(Arc::clone(&issuer)));
        let access: Arc<dyn AccessPolicy> = policy_from_config(&config.access)
            .map_err(|err| ServerError::Config(err.to_string()))?
            .into();
        let audit = build_audit_sink(&config)?;
        Ok(Self {
            config,
            registry,
            issuer,
            sessions,
            access,
            audit,
            attempts: Arc::new(NoopCsrfAttemptSink),
            metrics: Arc::new(NoopMetrics),
            pipeline: InvocationPipeline::new(),
        })
    }

    /// Replaces the interceptor pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: InvocationPipeline) -> Self {
        self.pipeline = pipeline;
        self
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

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn DispatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the session store used to open client sessions.
    #[must_use]
    pub fn sessions(&self) -> Arc<InMemorySessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Returns the signed token issuer.
    #[must_use]
    pub fn issuer(&self) -> Arc<CsrfTokenIssuer> {
        Arc::clone(&self.issuer)
    }

    /// Builds the dispatcher for this server's configuration.
    #[must_use]
    pub fn dispatcher(&self) -> RequestDispatcher {
        let sessions: Arc<dyn SessionTokens> = Arc::clone(&self.sessions) as _;
        let gate = SecurityGate::new(&self.config.security, sessions, self.issuer.verifier())
            .with_attempt_sink(Arc::clone(&self.attempts))
            .with_audit(Arc::clone(&self.audit));
        RequestDispatcher::new(self.registry.clone(), gate)
            .with_route_decoder(RouteDecoder::new(self.config.server.route_prefix.clone()))
            .with_access_policy(Arc::clone(&self.access))
            .with_pipeline(self.pipeline.clone())
            .with_audit(Arc::clone(&self.audit))
            .with_metrics(Arc::clone(&self.metrics))
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            dispatcher: self.dispatcher(),
            max_body_bytes: self.config.server.max_body_bytes,
        });
        Router::new()
            .fallback(handle_gateway)
            .layer(DefaultBodyLimit::max(self.config.server.max_body_bytes))
            .with_state(state)
    }

    /// Binds the configured address and serves until the server stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when serving fails.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

/// Builds the audit sink described by config.
fn build_audit_sink(config: &GatewayConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    if !config.audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match config.audit.path.as_deref() {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: HTTP Handler
// ============================================================================

/// Shared server state for the gateway handler.
struct ServerState {
    /// Request dispatcher.
    dispatcher: RequestDispatcher,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// Handles every request reaching the router.
async fn handle_gateway(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let route = decode_path(request.uri().path());
    if !state.dispatcher.handles(&route) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| *peer);
    let mut gateway_request = request_head(route, request.headers());
    if let Some(peer) = peer {
        gateway_request = gateway_request.with_peer(peer);
    }

    let gateway_request = if is_multipart(request.headers()) {
        match read_multipart(request, &state).await {
            Ok((form, body_bytes)) => gateway_request.with_multipart(form, body_bytes),
            Err(status) => return status.into_response(),
        }
    } else {
        match Bytes::from_request(request, &state).await {
            Ok(bytes) if bytes.len() > state.max_body_bytes => {
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
            Ok(bytes) => gateway_request.with_json(bytes),
            Err(rejection) => return rejection.into_response(),
        }
    };

    match dispatch_with_blocking(&state.dispatcher, &gateway_request) {
        DispatchOutcome::Handled(response) => into_http_response(response),
        DispatchOutcome::NotHandled => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Percent-decodes a request path; undecodable paths pass through raw.
fn decode_path(path: &str) -> String {
    percent_decode_str(path)
        .decode_utf8()
        .map_or_else(|_| path.to_string(), |decoded| decoded.into_owned())
}

/// Copies the route, origin, and cookies into a gateway request.
fn request_head(route: String, headers: &HeaderMap) -> GatewayRequest {
    let mut request = GatewayRequest::new(route);
    if let Some(origin) = headers.get(ORIGIN).and_then(|value| value.to_str().ok()) {
        request = request.with_origin(origin);
    }
    for cookie in headers.get_all(COOKIE) {
        if let Ok(cookie) = cookie.to_str() {
            request = request.with_cookie_header(cookie);
        }
    }
    request
}

/// Returns `true` when the request declares a multipart body.
fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with(MULTIPART_CONTENT_TYPE))
}

/// Reads every multipart field into a form.
///
/// A field whose content cannot be read is recorded as a failed part so the
/// binder can report it against the parameter that asked for it. Any read
/// error also marks the form truncated; the binder never accepts it.
async fn read_multipart(
    request: Request,
    state: &Arc<ServerState>,
) -> Result<(MultipartForm, usize), StatusCode> {
    let mut multipart =
        Multipart::from_request(request, state).await.map_err(|_| StatusCode::BAD_REQUEST)?;
    let mut form = MultipartForm::new();
    let mut body_bytes = 0usize;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(StatusCode::PAYLOAD_TOO_LARGE);
            }
            Err(err) => {
                form.mark_truncated(err.body_text());
                break;
            }
        };
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        match field.bytes().await {
            Ok(data) => {
                body_bytes = body_bytes.saturating_add(data.len());
                if body_bytes > state.max_body_bytes {
                    return Err(StatusCode::PAYLOAD_TOO_LARGE);
                }
                let mut part = FormPart::new(name, data);
                if let Some(file_name) = file_name {
                    part = part.with_file_name(file_name);
                }
                if let Some(content_type) = content_type {
                    part = part.with_content_type(content_type);
                }
                form.insert(part);
            }
            Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(StatusCode::PAYLOAD_TOO_LARGE);
            }
            Err(err) => {
                let reason = err.body_text();
                form.mark_truncated(reason.clone());
                form.insert_failure(name, reason);
                break;
            }
        }
    }
    Ok((form, body_bytes))
}

/// Dispatches a request, shifting to a blocking context when available.
fn dispatch_with_blocking(
    dispatcher: &RequestDispatcher,
    request: &GatewayRequest,
) -> DispatchOutcome {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| dispatcher.dispatch(request))
        }
        _ => dispatcher.dispatch(request),
    }
}

/// Converts a dispatcher response into an axum response.
fn into_http_response(response: GatewayResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http = (status, response.body).into_response();
    for (name, value) in response.headers {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value))
        {
            http.headers_mut().insert(name, value);
        }
    }
    http
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
