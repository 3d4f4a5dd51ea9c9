// crates/callgate-http/src/telemetry.rs
// ============================================================================
// Module: Dispatch Telemetry
// Description: Observability hooks for gateway dispatches.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: callgate-core, serde
// ============================================================================

//! ## Overview
//! A thin metrics interface for dispatch counters and latency histograms.
//! Deployments plug in their own exporter by implementing
//! [`DispatchMetrics`]; the default discards everything.
//! Labels are derived from decoded routes and must be treated as untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use callgate_core::CallTarget;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for dispatch histograms.
pub const DISPATCH_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Dispatch result classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchResult {
    /// Callable ran and its result was encoded.
    Success,
    /// Binding, invocation, or encoding failed with a failure envelope.
    Failure,
    /// Request was refused before invocation (route, security, or access).
    Rejected,
    /// No registered callable matched; the request passed down the chain.
    NotHandled,
}

impl DispatchResult {
    /// Returns a stable label for the result.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Rejected => "rejected",
            Self::NotHandled => "not_handled",
        }
    }
}

/// Dispatch metric event payload.
///
/// # Invariants
/// - `target` is `None` when the route could not be decoded.
#[derive(Debug, Clone)]
pub struct DispatchMetricEvent {
    /// Decoded call target when available.
    pub target: Option<CallTarget>,
    /// Dispatch result.
    pub result: DispatchResult,
    /// HTTP status produced, if the request was handled.
    pub status: Option<u16>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for dispatches and latencies.
pub trait DispatchMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: DispatchMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: DispatchMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl DispatchMetrics for NoopMetrics {
    fn record_request(&self, _event: DispatchMetricEvent) {}

    fn record_latency(&self, _event: DispatchMetricEvent, _latency: Duration) {}
}
