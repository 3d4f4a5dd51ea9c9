// crates/callgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Callgate Interfaces
// Description: Collaborator contracts for callables, access, and interception.
// Purpose: Define the seams between the dispatch core and its host.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The core never inspects callable types at runtime. Targets implement
//! [`Callable`] and receive their arguments by name. Hosts plug in an
//! [`AccessPolicy`], zero or more [`CallInterceptor`] values, and an
//! [`UploadSource`] for multipart bodies.
//!
//! Security posture: argument maps and upload parts are untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::envelope::CallContext;
use crate::core::error::TargetError;
use crate::core::identifiers::ClassName;
use crate::core::identifiers::MethodName;
use crate::core::value::BoundArguments;
use crate::core::value::FormPart;

// ============================================================================
// SECTION: Callable Targets
// ============================================================================

/// Invocation capability implemented by every registered target.
pub trait Callable: Send + Sync {
    /// Invokes `method` with bound arguments.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when the target fails or rejects its input.
    fn invoke(
        &self,
        method: &MethodName,
        args: &BoundArguments,
        ctx: &mut CallContext,
    ) -> Result<Value, TargetError>;
}

impl<F> Callable for F
where
    F: Fn(&MethodName, &BoundArguments, &mut CallContext) -> Result<Value, TargetError>
        + Send
        + Sync,
{
    fn invoke(
        &self,
        method: &MethodName,
        args: &BoundArguments,
        ctx: &mut CallContext,
    ) -> Result<Value, TargetError> {
        self(method, args, ctx)
    }
}

// ============================================================================
// SECTION: Access Policy
// ============================================================================

/// Yes/no authorization predicate for a (class, method) pair.
pub trait AccessPolicy: Send + Sync {
    /// Returns true when the caller may invoke the method.
    fn access_granted(&self, class: &ClassName, method: &MethodName) -> bool;
}

// ============================================================================
// SECTION: Interception
// ============================================================================

/// Read-only view of a call handed to interceptors.
#[derive(Debug, Clone, Copy)]
pub struct CallView<'a> {
    /// Target class.
    pub class: &'a ClassName,
    /// Target method.
    pub method: &'a MethodName,
    /// Current argument map.
    pub arguments: &'a BoundArguments,
}

/// Decision returned by an interceptor phase.
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptOutcome {
    /// Proceed unchanged.
    Continue,
    /// Replace the argument map (before phase only).
    ReplaceArguments(BoundArguments),
    /// Override the final result.
    Override(Value),
    /// Interrupt the call; the value, if any, becomes the result.
    Abort(Option<Value>),
}

/// Before/after interception contract around an invocation.
///
/// In the after phase only `Override` and `Abort(Some(_))` have an effect;
/// both replace the final result.
pub trait CallInterceptor: Send + Sync {
    /// Runs before the target is invoked.
    fn before(&self, _call: &CallView<'_>) -> InterceptOutcome {
        InterceptOutcome::Continue
    }

    /// Runs after the target returned successfully.
    fn after(&self, _call: &CallView<'_>, _result: &Value) -> InterceptOutcome {
        InterceptOutcome::Continue
    }
}

// ============================================================================
// SECTION: Upload Source
// ============================================================================

/// Failure reading a form part.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartError {
    /// Part exists but its payload could not be read.
    #[error("part read failed: {0}")]
    Read(String),
}

/// Named-part accessor for multipart bodies.
pub trait UploadSource {
    /// Returns the named part, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`PartError`] when the part exists but cannot be read.
    fn part(&self, name: &str) -> Result<Option<FormPart>, PartError>;

    /// Returns why the body stopped early, when the transport could not read
    /// it to the end. A truncated body never binds successfully.
    fn truncated(&self) -> Option<&str> {
        None
    }
}
