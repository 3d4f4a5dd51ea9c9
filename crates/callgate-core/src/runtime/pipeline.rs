// crates/callgate-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Invocation Pipeline
// Description: Before/after interception around a single target invocation.
// Purpose: Let collaborators replace arguments, override results, or abort.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The pipeline drives a [`CallEnvelope`] through
//! `Created -> BeforeFired -> (Interrupted | Invoked) -> AfterFired -> Done`.
//! Interceptors run in registration order. An abort in the before phase skips
//! the invocation entirely. Any override is applied as the last step before
//! `Done`, so it always wins over the value the target produced.
//!
//! ## Invariants
//! - The target is invoked at most once per envelope.
//! - Target failures propagate unchanged; this layer never retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::envelope::CallEnvelope;
use crate::core::envelope::CallPhase;
use crate::core::error::TargetError;
use crate::interfaces::CallInterceptor;
use crate::interfaces::CallView;
use crate::interfaces::Callable;
use crate::interfaces::InterceptOutcome;

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Interceptable invocation driver.
#[derive(Clone, Default)]
pub struct InvocationPipeline {
    /// Interceptors in registration order.
    interceptors: Vec<Arc<dyn CallInterceptor>>,
}

impl fmt::Debug for InvocationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationPipeline")
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl InvocationPipeline {
    /// Creates a pipeline without interceptors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with an interceptor appended.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn CallInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Returns the number of registered interceptors.
    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Runs the before phase, the invocation, and the after phase.
    ///
    /// # Errors
    ///
    /// Returns the target's [`TargetError`] unchanged when invocation fails.
    pub fn run(
        &self,
        target: &dyn Callable,
        envelope: &mut CallEnvelope,
    ) -> Result<(), TargetError> {
        self.fire_before(envelope);
        if envelope.is_interrupted() {
            envelope.mark(CallPhase::Interrupted);
            envelope.settle();
            return Ok(());
        }

        let result = {
            let (call, arguments, context) = envelope.invoke_parts();
            target.invoke(&call.method, arguments, context)?
        };
        envelope.set_result(result);
        envelope.mark(CallPhase::Invoked);

        self.fire_after(envelope);
        envelope.settle();
        Ok(())
    }

    /// Runs every before interceptor until one aborts.
    fn fire_before(&self, envelope: &mut CallEnvelope) {
        for interceptor in &self.interceptors {
            let outcome = interceptor.before(&view(envelope));
            match outcome {
                InterceptOutcome::Continue => {}
                InterceptOutcome::ReplaceArguments(arguments) => {
                    envelope.replace_arguments(arguments);
                }
                InterceptOutcome::Override(value) => envelope.set_override(value),
                InterceptOutcome::Abort(Some(value)) => {
                    envelope.interrupt();
                    envelope.set_override(value);
                    break;
                }
                InterceptOutcome::Abort(None) => {
                    envelope.interrupt();
                    // An earlier override survives a value-less abort.
                    if !envelope.has_override() {
                        envelope.set_override(Value::Null);
                    }
                    break;
                }
            }
        }
        envelope.mark(CallPhase::BeforeFired);
    }

    /// Runs every after interceptor; the last override wins.
    fn fire_after(&self, envelope: &mut CallEnvelope) {
        for interceptor in &self.interceptors {
            let Some(result) = envelope.result().cloned() else {
                break;
            };
            let outcome = interceptor.after(&view(envelope), &result);
            match outcome {
                InterceptOutcome::Override(value) | InterceptOutcome::Abort(Some(value)) => {
                    envelope.set_override(value);
                }
                InterceptOutcome::Continue
                | InterceptOutcome::ReplaceArguments(_)
                | InterceptOutcome::Abort(None) => {}
            }
        }
        envelope.mark(CallPhase::AfterFired);
    }
}

/// Builds the interceptor view of an envelope.
const fn view(envelope: &CallEnvelope) -> CallView<'_> {
    let target = envelope.target();
    CallView {
        class: &target.class,
        method: &target.method,
        arguments: envelope.arguments(),
    }
}
