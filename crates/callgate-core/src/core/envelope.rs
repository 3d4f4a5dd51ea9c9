// crates/callgate-core/src/core/envelope.rs
// ============================================================================
// Module: Call Envelope
// Description: Per-request invocation state and callable side channel.
// Purpose: Track arguments, results, overrides, and phase markers for one call.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`CallEnvelope`] is created when a request has been bound and is dropped
//! when the response is produced. It is never shared between requests. The
//! embedded [`CallContext`] is the only state a callable may write besides its
//! return value; it feeds the `$invoke` and `$root` response keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::CallTarget;
use crate::core::value::BoundArguments;

// ============================================================================
// SECTION: Call Context
// ============================================================================

/// Side-channel data contributed by a callable during invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    /// Client functions to invoke after the response, keyed by name.
    deferred: Map<String, Value>,
    /// Template data exported to the client.
    template_data: Map<String, Value>,
}

impl CallContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a client-side function invocation.
    pub fn invoke_later(&mut self, function: impl Into<String>, args: Value) {
        self.deferred.insert(function.into(), args);
    }

    /// Exports a template data entry.
    pub fn set_template_data(&mut self, key: impl Into<String>, value: Value) {
        self.template_data.insert(key.into(), value);
    }

    /// Returns the queued client invocations.
    #[must_use]
    pub const fn deferred(&self) -> &Map<String, Value> {
        &self.deferred
    }

    /// Returns the exported template data.
    #[must_use]
    pub const fn template_data(&self) -> &Map<String, Value> {
        &self.template_data
    }

    /// Splits the context into deferred invocations and template data.
    #[must_use]
    pub fn into_parts(self) -> (Map<String, Value>, Map<String, Value>) {
        (self.deferred, self.template_data)
    }
}

// ============================================================================
// SECTION: Phases
// ============================================================================

/// Invocation pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Envelope created.
    Created,
    /// Before interceptors ran.
    BeforeFired,
    /// Call interrupted before invocation.
    Interrupted,
    /// Target invoked.
    Invoked,
    /// After interceptors ran.
    AfterFired,
    /// Final result settled.
    Done,
}

/// Timestamped phase marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMarker {
    /// Phase reached.
    pub phase: CallPhase,
    /// Wall-clock time the phase was reached.
    pub at: SystemTime,
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Transient state of one invocation.
#[derive(Debug, Clone)]
pub struct CallEnvelope {
    /// Decoded target.
    target: CallTarget,
    /// Current argument map.
    arguments: BoundArguments,
    /// True once an interceptor replaced the arguments.
    arguments_replaced: bool,
    /// Result produced by the target.
    result: Option<Value>,
    /// Interceptor override applied last.
    override_value: Option<Value>,
    /// True when the call was interrupted before invocation.
    interrupted: bool,
    /// Phase markers in the order reached.
    phases: Vec<PhaseMarker>,
    /// Callable side channel.
    context: CallContext,
}

impl CallEnvelope {
    /// Creates an envelope in the `Created` phase.
    #[must_use]
    pub fn new(target: CallTarget, arguments: BoundArguments) -> Self {
        let mut envelope = Self {
            target,
            arguments,
            arguments_replaced: false,
            result: None,
            override_value: None,
            interrupted: false,
            phases: Vec::new(),
            context: CallContext::new(),
        };
        envelope.mark(CallPhase::Created);
        envelope
    }

    /// Returns the call target.
    #[must_use]
    pub const fn target(&self) -> &CallTarget {
        &self.target
    }

    /// Returns the current argument map.
    #[must_use]
    pub const fn arguments(&self) -> &BoundArguments {
        &self.arguments
    }

    /// Returns true when an interceptor replaced the arguments.
    #[must_use]
    pub const fn arguments_replaced(&self) -> bool {
        self.arguments_replaced
    }

    /// Returns the settled result, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns true when the call was interrupted.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Returns the phase markers reached so far.
    #[must_use]
    pub fn phases(&self) -> &[PhaseMarker] {
        &self.phases
    }

    /// Returns true when the envelope reached `phase`.
    #[must_use]
    pub fn reached(&self, phase: CallPhase) -> bool {
        self.phases.iter().any(|marker| marker.phase == phase)
    }

    /// Returns the callable side channel.
    #[must_use]
    pub const fn context(&self) -> &CallContext {
        &self.context
    }

    /// Consumes the envelope into its final result and side channel.
    #[must_use]
    pub fn into_outcome(self) -> (Value, CallContext) {
        (self.result.unwrap_or(Value::Null), self.context)
    }

    /// Records a phase marker.
    pub(crate) fn mark(&mut self, phase: CallPhase) {
        self.phases.push(PhaseMarker {
            phase,
            at: SystemTime::now(),
        });
    }

    /// Replaces the argument map.
    pub(crate) fn replace_arguments(&mut self, arguments: BoundArguments) {
        self.arguments = arguments;
        self.arguments_replaced = true;
    }

    /// Stores the provisional result.
    pub(crate) fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }

    /// Stores an override applied when the call settles.
    pub(crate) fn set_override(&mut self, value: Value) {
        self.override_value = Some(value);
    }

    /// Returns true when an interceptor already set an override.
    pub(crate) const fn has_override(&self) -> bool {
        self.override_value.is_some()
    }

    /// Marks the call interrupted.
    pub(crate) const fn interrupt(&mut self) {
        self.interrupted = true;
    }

    /// Applies any override and moves to `Done`.
    pub(crate) fn settle(&mut self) {
        if let Some(value) = self.override_value.take() {
            self.result = Some(value);
        }
        self.mark(CallPhase::Done);
    }

    /// Borrows the pieces needed to invoke the target.
    pub(crate) const fn invoke_parts(
        &mut self,
    ) -> (&CallTarget, &BoundArguments, &mut CallContext) {
        (&self.target, &self.arguments, &mut self.context)
    }
}
