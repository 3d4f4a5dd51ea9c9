// crates/callgate-core/tests/pipeline.rs
// ============================================================================
// Module: Invocation Pipeline Tests
// Description: Before/after interception, overrides, and aborts.
// Purpose: Ensure the target runs at most once and overrides always win.
// Dependencies: callgate-core
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use callgate_core::BoundArguments;
use callgate_core::CallContext;
use callgate_core::CallEnvelope;
use callgate_core::CallError;
use callgate_core::CallInterceptor;
use callgate_core::CallPhase;
use callgate_core::CallTarget;
use callgate_core::CallView;
use callgate_core::Callable;
use callgate_core::InterceptOutcome;
use callgate_core::InvocationPipeline;
use callgate_core::MethodName;
use callgate_core::TargetError;
use serde_json::Value;
use serde_json::json;

/// Counts invocations and echoes the `name` argument.
#[derive(Default)]
struct CountingTarget {
    calls: AtomicUsize,
}

impl Callable for CountingTarget {
    fn invoke(
        &self,
        _method: &MethodName,
        args: &BoundArguments,
        ctx: &mut CallContext,
    ) -> Result<Value, TargetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.invoke_later("refresh", json!([1]));
        Ok(json!(format!("Hello {}", args.str("name").unwrap_or("nobody"))))
    }
}

/// Interceptor returning fixed outcomes.
struct Fixed {
    before: InterceptOutcome,
    after: InterceptOutcome,
}

impl CallInterceptor for Fixed {
    fn before(&self, _call: &CallView<'_>) -> InterceptOutcome {
        self.before.clone()
    }

    fn after(&self, _call: &CallView<'_>, _result: &Value) -> InterceptOutcome {
        self.after.clone()
    }
}

fn envelope() -> CallEnvelope {
    CallEnvelope::new(
        CallTarget::new("Greeter", "greet"),
        BoundArguments::new().with_value("name", json!("Ada")),
    )
}

fn pipeline(before: InterceptOutcome, after: InterceptOutcome) -> InvocationPipeline {
    InvocationPipeline::new().with_interceptor(Arc::new(Fixed {
        before,
        after,
    }))
}

#[test]
fn plain_pipeline_invokes_once_and_records_phases() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    InvocationPipeline::new().run(&target, &mut envelope).unwrap();
    assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    let phases: Vec<CallPhase> = envelope.phases().iter().map(|marker| marker.phase).collect();
    assert_eq!(
        phases,
        vec![
            CallPhase::Created,
            CallPhase::BeforeFired,
            CallPhase::Invoked,
            CallPhase::AfterFired,
            CallPhase::Done,
        ]
    );
    let (result, context) = envelope.into_outcome();
    assert_eq!(result, json!("Hello Ada"));
    assert_eq!(context.deferred().get("refresh"), Some(&json!([1])));
}

#[test]
fn before_abort_with_value_skips_invocation() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    pipeline(InterceptOutcome::Abort(Some(json!("cached"))), InterceptOutcome::Continue)
        .run(&target, &mut envelope)
        .unwrap();
    assert_eq!(target.calls.load(Ordering::SeqCst), 0);
    assert!(envelope.is_interrupted());
    assert!(envelope.reached(CallPhase::Interrupted));
    assert!(!envelope.reached(CallPhase::Invoked));
    assert!(!envelope.reached(CallPhase::AfterFired));
    assert_eq!(envelope.into_outcome().0, json!("cached"));
}

#[test]
fn before_abort_without_value_yields_null() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    pipeline(InterceptOutcome::Abort(None), InterceptOutcome::Continue)
        .run(&target, &mut envelope)
        .unwrap();
    assert_eq!(target.calls.load(Ordering::SeqCst), 0);
    assert_eq!(envelope.into_outcome().0, Value::Null);
}

#[test]
fn abort_without_value_keeps_earlier_override() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    InvocationPipeline::new()
        .with_interceptor(Arc::new(Fixed {
            before: InterceptOutcome::Override(json!("from cache")),
            after: InterceptOutcome::Continue,
        }))
        .with_interceptor(Arc::new(Fixed {
            before: InterceptOutcome::Abort(None),
            after: InterceptOutcome::Continue,
        }))
        .run(&target, &mut envelope)
        .unwrap();
    assert_eq!(target.calls.load(Ordering::SeqCst), 0);
    assert!(envelope.is_interrupted());
    assert_eq!(envelope.into_outcome().0, json!("from cache"));
}

#[test]
fn after_override_wins_even_though_target_ran() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    pipeline(InterceptOutcome::Continue, InterceptOutcome::Override(json!("overridden")))
        .run(&target, &mut envelope)
        .unwrap();
    assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    assert_eq!(envelope.into_outcome().0, json!("overridden"));
}

#[test]
fn before_override_without_abort_still_invokes_and_wins() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    pipeline(InterceptOutcome::Override(json!(7)), InterceptOutcome::Continue)
        .run(&target, &mut envelope)
        .unwrap();
    assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    assert_eq!(envelope.into_outcome().0, json!(7));
}

#[test]
fn replaced_arguments_reach_the_target() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    let replacement = BoundArguments::new().with_value("name", json!("Grace"));
    pipeline(InterceptOutcome::ReplaceArguments(replacement), InterceptOutcome::Continue)
        .run(&target, &mut envelope)
        .unwrap();
    assert!(envelope.arguments_replaced());
    assert_eq!(envelope.into_outcome().0, json!("Hello Grace"));
}

#[test]
fn later_after_override_replaces_earlier_one() {
    let target = CountingTarget::default();
    let mut envelope = envelope();
    InvocationPipeline::new()
        .with_interceptor(Arc::new(Fixed {
            before: InterceptOutcome::Continue,
            after: InterceptOutcome::Override(json!("first")),
        }))
        .with_interceptor(Arc::new(Fixed {
            before: InterceptOutcome::Continue,
            after: InterceptOutcome::Override(json!("second")),
        }))
        .run(&target, &mut envelope)
        .unwrap();
    assert_eq!(envelope.into_outcome().0, json!("second"));
}

#[test]
fn target_failure_propagates_and_unwraps_one_level() {
    let failing = |_method: &MethodName,
                   _args: &BoundArguments,
                   _ctx: &mut CallContext|
     -> Result<Value, TargetError> {
        Err(TargetError::raised("IllegalStateException", "boom").wrap())
    };
    let mut envelope = envelope();
    let err = InvocationPipeline::new().run(&failing, &mut envelope).unwrap_err();
    assert!(!envelope.reached(CallPhase::Done));

    let target = envelope.target().clone();
    let call_error = CallError::from_target(&target.class, &target.method, err);
    assert_eq!(call_error.envelope_type(), "IllegalStateException");
    assert_eq!(call_error.details().get("message"), Some(&json!("boom")));
}
