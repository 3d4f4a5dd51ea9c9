// crates/callgate-http/src/dispatcher.rs
// ============================================================================
// Module: Request Dispatcher
// Description: Route, secure, bind, authorize, invoke, and encode one request.
// Purpose: Turn a gateway request into exactly one response or a pass-through.
// Dependencies: callgate-core, crate::{audit, request, security, telemetry}
// ============================================================================

//! ## Overview
//! Dispatch walks a fixed sequence:
//! `Routed -> SecurityPassed -> CallableResolved -> Bound -> AccessChecked ->
//! Invoked -> Serialized`.
//!
//! - Route failure: 400.
//! - Security failure: 403 or 419.
//! - Unknown class or method: [`DispatchOutcome::NotHandled`].
//! - Binder failure: 500 failure envelope.
//! - Access denied: 403, nothing invoked.
//! - Pipeline failure: 500 failure envelope.
//! - Success: 200 success envelope.
//!
//! Every handled response carries `Access-Control-Allow-Origin` and
//! `Vary: Origin`. Uploaded files live inside the request and are dropped
//! with it whichever way dispatch ends.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use callgate_core::AccessPolicy;
use callgate_core::CallEnvelope;
use callgate_core::CallError;
use callgate_core::CallTarget;
use callgate_core::CallableRegistry;
use callgate_core::InvocationPipeline;
use callgate_core::ParameterBinder;
use callgate_core::ResultSerializer;
use callgate_core::RouteDecoder;
use callgate_core::SerializedResponse;

use crate::access::AllowAllAccess;
use crate::audit::AccessAuditEvent;
use crate::audit::AuditSink;
use crate::audit::DispatchAuditEvent;
use crate::audit::DispatchAuditEventParams;
use crate::audit::NoopAuditSink;
use crate::audit::SecurityAuditEvent;
use crate::audit::SecurityAuditEventParams;
use crate::audit::SecurityEventKind;
use crate::request::GatewayRequest;
use crate::security::SecurityGate;
use crate::telemetry::DispatchMetricEvent;
use crate::telemetry::DispatchMetrics;
use crate::telemetry::DispatchResult;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// CORS header naming the allowed origin.
pub const ALLOW_ORIGIN_HEADER: &str = "Access-Control-Allow-Origin";
/// Cache-variance header emitted alongside the CORS header.
pub const VARY_HEADER: &str = "Vary";
/// Content type header name.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
/// HTTP status for undecodable routes.
const BAD_REQUEST_STATUS: u16 = 400;
/// Error kind label for requests refused by the security gate.
const SECURITY_REJECTED_KIND: &str = "security_rejected";

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Response produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in emission order.
    pub headers: Vec<(&'static str, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl GatewayResponse {
    /// Returns the first header value with the given name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the body is not JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Result of dispatching one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The dispatcher produced a response.
    Handled(GatewayResponse),
    /// No registered callable matched; the next handler in the chain decides.
    NotHandled,
}

/// Internal summary of a handled dispatch for audit and metrics.
struct Handled {
    /// Decoded target when available.
    target: Option<CallTarget>,
    /// Dispatch result classification.
    result: DispatchResult,
    /// Normalized error kind label.
    error_kind: Option<&'static str>,
    /// Response to return.
    response: GatewayResponse,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Dispatches gateway requests to registered callables.
pub struct RequestDispatcher {
    /// Route decoder for the configured prefix.
    decoder: RouteDecoder,
    /// Origin and CSRF gate.
    gate: SecurityGate,
    /// Frozen callable registry.
    registry: CallableRegistry,
    /// Parameter binder.
    binder: ParameterBinder,
    /// Access policy consulted before invocation.
    access: Arc<dyn AccessPolicy>,
    /// Interceptor pipeline.
    pipeline: InvocationPipeline,
    /// Envelope encoder.
    serializer: ResultSerializer,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn DispatchMetrics>,
}

impl RequestDispatcher {
    /// Creates a dispatcher with the default route prefix, an allow-all
    /// policy, no interceptors, and no-op audit and metrics sinks.
    #[must_use]
    pub fn new(registry: CallableRegistry, gate: SecurityGate) -> Self {
        Self {
            decoder: RouteDecoder::default(),
            gate,
            registry,
            binder: ParameterBinder::new(),
            access: Arc::new(AllowAllAccess),
            pipeline: InvocationPipeline::new(),
            serializer: ResultSerializer::new(),
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Replaces the route decoder.
    #[must_use]
    pub fn with_route_decoder(mut self, decoder: RouteDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replaces the access policy.
    #[must_use]
    pub fn with_access_policy(mut self, access: Arc<dyn AccessPolicy>) -> Self {
        self.access = access;
        self
    }

    /// Replaces the interceptor pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: InvocationPipeline) -> Self {
        self.pipeline = pipeline;
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

    /// Returns `true` when `route` carries this dispatcher's prefix.
    #[must_use]
    pub fn handles(&self, route: &str) -> bool {
        self.decoder.matches(route)
    }

    /// Returns the callable registry.
    #[must_use]
    pub const fn registry(&self) -> &CallableRegistry {
        &self.registry
    }

    /// Dispatches one request.
    #[must_use]
    pub fn dispatch(&self, request: &GatewayRequest) -> DispatchOutcome {
        let started = Instant::now();
        match self.dispatch_inner(request) {
            Ok(handled) => {
                self.observe(
                    request,
                    handled.target,
                    handled.result,
                    Some(handled.response.status),
                    handled.error_kind,
                    handled.response.body.len(),
                    started,
                );
                DispatchOutcome::Handled(handled.response)
            }
            Err(target) => {
                let result = DispatchResult::NotHandled;
                self.observe(request, Some(target), result, None, None, 0, started);
                DispatchOutcome::NotHandled
            }
        }
    }

    /// Runs the dispatch sequence; `Err` carries a target no callable matched.
    fn dispatch_inner(&self, request: &GatewayRequest) -> Result<Handled, CallTarget> {
        let target = match self.decoder.decode(request.route()) {
            Ok(target) => target,
            Err(error) => {
                self.audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
                    kind: SecurityEventKind::MalformedRoute,
                    peer_ip: request.peer_ip(),
                    origin: None,
                    message: Some(error.to_string()),
                }));
                let error = CallError::from(error);
                return Ok(Handled {
                    target: None,
                    result: DispatchResult::Rejected,
                    error_kind: Some(error.kind()),
                    response: self.empty_response(BAD_REQUEST_STATUS),
                });
            }
        };

        if let Some(status) = self.gate.check(request).verdict().rejection_status() {
            return Ok(Handled {
                target: Some(target),
                result: DispatchResult::Rejected,
                error_kind: Some(SECURITY_REJECTED_KIND),
                response: self.empty_response(status),
            });
        }

        let Some((class, method)) = self.registry.resolve(&target) else {
            return Err(target);
        };

        let arguments = match self.binder.bind(&target, method, request.payload().as_body()) {
            Ok(arguments) => arguments,
            Err(error) => return Ok(self.failure(target, &error)),
        };

        if !self.access.access_granted(&target.class, &target.method) {
            self.audit.record_access(&AccessAuditEvent::new(request.peer_ip(), &target));
            let error = CallError::AccessDenied {
                class: target.class.clone(),
                method: target.method.clone(),
            };
            return Ok(Handled {
                target: Some(target),
                result: DispatchResult::Rejected,
                error_kind: Some(error.kind()),
                response: self.empty_response(error.http_status()),
            });
        }

        let mut envelope = CallEnvelope::new(target.clone(), arguments);
        if let Err(error) = self.pipeline.run(class.target(), &mut envelope) {
            let error = CallError::from_target(&target.class, &target.method, error);
            return Ok(self.failure(target, &error));
        }

        let (result, context) = envelope.into_outcome();
        match self.serializer.success(result, context) {
            Ok(serialized) => Ok(Handled {
                target: Some(target),
                result: DispatchResult::Success,
                error_kind: None,
                response: self.with_cors(serialized),
            }),
            Err(error) => Ok(self.failure(target, &error)),
        }
    }

    /// Builds a handled failure envelope.
    fn failure(&self, target: CallTarget, error: &CallError) -> Handled {
        Handled {
            target: Some(target),
            result: DispatchResult::Failure,
            error_kind: Some(error.kind()),
            response: self.with_cors(self.serializer.failure(error)),
        }
    }

    /// Builds a body-less response carrying the CORS headers.
    fn empty_response(&self, status: u16) -> GatewayResponse {
        GatewayResponse {
            status,
            headers: self.cors_headers(),
            body: Vec::new(),
        }
    }

    /// Attaches the CORS headers to a serialized envelope.
    fn with_cors(&self, serialized: SerializedResponse) -> GatewayResponse {
        let mut headers = self.cors_headers();
        headers.push((CONTENT_TYPE_HEADER, serialized.content_type.to_string()));
        GatewayResponse {
            status: serialized.status,
            headers,
            body: serialized.body,
        }
    }

    /// Returns the CORS headers emitted on every handled response.
    fn cors_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (ALLOW_ORIGIN_HEADER, self.gate.origin().to_string()),
            (VARY_HEADER, "Origin".to_string()),
        ]
    }

    /// Records audit and metrics for one dispatch.
    #[allow(clippy::too_many_arguments, reason = "Flat observation record per dispatch.")]
    fn observe(
        &self,
        request: &GatewayRequest,
        target: Option<CallTarget>,
        result: DispatchResult,
        status: Option<u16>,
        error_kind: Option<&'static str>,
        response_bytes: usize,
        started: Instant,
    ) {
        let event = DispatchMetricEvent {
            target: target.clone(),
            result,
            status,
            error_kind,
            request_bytes: request.body_bytes(),
            response_bytes,
        };
        self.metrics.record_request(event.clone());
        self.metrics.record_latency(event, started.elapsed());
        self.audit.record(&DispatchAuditEvent::new(DispatchAuditEventParams {
            peer_ip: request.peer_ip(),
            target,
            result,
            status,
            error_kind,
            request_bytes: request.body_bytes(),
            response_bytes,
        }));
    }
}
