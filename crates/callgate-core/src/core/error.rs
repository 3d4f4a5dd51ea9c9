// crates/callgate-core/src/core/error.rs
// ============================================================================
// Module: Callgate Errors
// Description: Target failures and the dispatch error taxonomy.
// Purpose: Keep failure causes inspectable and map them to wire envelopes.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Two layers of failure exist. [`TargetError`] is what a callable raises; it
//! may be wrapped once by an invocation layer. [`CallError`] is the dispatch
//! taxonomy surfaced to clients. Conversion from a target failure unwraps
//! exactly one wrapper level so the real cause is what gets reported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ClassName;
use crate::core::identifiers::MethodName;
use crate::core::route::RouteError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Failure fields never exposed in failure details.
pub const NOISE_FIELDS: [&str; 4] = ["cause", "stackTrace", "suppressedExceptions", "target"];

/// Envelope type reported for constraint violations.
pub const VALIDATION_FAILURE_TYPE: &str = "ConstraintViolationException";

/// Failure kind used when a nested wrapper survives one level of unwrapping.
const WRAPPED_FAILURE_KIND: &str = "InvocationTargetException";

// ============================================================================
// SECTION: Target Failures
// ============================================================================

/// Structured failure raised by a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct RaisedFailure {
    /// Failure type name reported as the envelope `type`.
    kind: String,
    /// Human-readable message.
    message: String,
    /// Additional public fields.
    fields: Map<String, Value>,
    /// Underlying cause description, kept for logging only.
    cause: Option<String>,
    /// Captured frames, kept for logging only.
    stack_trace: Vec<String>,
}

impl RaisedFailure {
    /// Creates a failure with a type name and message.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            fields: Map::new(),
            cause: None,
            stack_trace: Vec::new(),
        }
    }

    /// Adds a public field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Records the underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Records a captured frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack_trace.push(frame.into());
        self
    }

    /// Returns the failure type name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the recorded cause.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Returns the captured frames.
    #[must_use]
    pub fn stack_trace(&self) -> &[String] {
        &self.stack_trace
    }

    /// Returns the public details: the message plus fields minus noise.
    #[must_use]
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("message".to_string(), Value::String(self.message.clone()));
        for (name, value) in &self.fields {
            if !NOISE_FIELDS.contains(&name.as_str()) {
                details.insert(name.clone(), value.clone());
            }
        }
        details
    }
}

/// Failure raised by a callable target.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TargetError {
    /// Constraint violations reported by the target.
    #[error("validation failed: {}", .messages.join("; "))]
    ValidationFailure {
        /// Violation messages.
        messages: Vec<String>,
    },
    /// Target raised a structured failure.
    #[error("{}: {}", .0.kind(), .0.message())]
    Raised(RaisedFailure),
    /// Failure wrapped by an invocation layer.
    #[error("invocation failed: {0}")]
    Wrapped(Box<TargetError>),
}

impl TargetError {
    /// Creates a raised failure.
    #[must_use]
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised(RaisedFailure::new(kind, message))
    }

    /// Creates a validation failure.
    #[must_use]
    pub fn validation<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ValidationFailure {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Wraps this failure in one invocation layer.
    #[must_use]
    pub fn wrap(self) -> Self {
        Self::Wrapped(Box::new(self))
    }

    /// Removes exactly one wrapper level, if present.
    #[must_use]
    pub fn unwrap_once(self) -> Self {
        match self {
            Self::Wrapped(inner) => *inner,
            other => other,
        }
    }

    /// Converts the failure into a raised failure description.
    fn into_raised(self) -> RaisedFailure {
        match self {
            Self::Raised(failure) => failure,
            Self::ValidationFailure {
                messages,
            } => RaisedFailure::new(VALIDATION_FAILURE_TYPE, messages.join("; ")),
            Self::Wrapped(inner) => {
                let message = inner.to_string();
                RaisedFailure::new(WRAPPED_FAILURE_KIND, message.clone()).with_cause(message)
            }
        }
    }
}

// ============================================================================
// SECTION: Dispatch Errors
// ============================================================================

/// Dispatch failure taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// Route could not be decoded.
    #[error("malformed route: {0}")]
    MalformedRoute(#[from] RouteError),
    /// Request body is not a usable argument object.
    #[error("malformed request body: {reason}")]
    MalformedBody {
        /// Parse or shape failure.
        reason: String,
    },
    /// Non-nullable parameter absent.
    #[error("missing parameter {param} for {class}.{method}")]
    MissingParameter {
        /// Target class.
        class: ClassName,
        /// Target method.
        method: MethodName,
        /// Missing parameter.
        param: String,
    },
    /// Non-nullable parameter failed coercion.
    #[error("invalid parameter {param} for {class}.{method}: expected {expected}")]
    InvalidParameter {
        /// Target class.
        class: ClassName,
        /// Target method.
        method: MethodName,
        /// Offending parameter.
        param: String,
        /// Declared type label.
        expected: String,
    },
    /// Upload placeholder or manifest is inconsistent.
    #[error("corrupted upload for {param} on {class}.{method}: {reason}")]
    UploadCorrupted {
        /// Target class.
        class: ClassName,
        /// Target method.
        method: MethodName,
        /// Upload parameter.
        param: String,
        /// Inconsistency description.
        reason: String,
    },
    /// Upload part missing or unreadable.
    #[error("failed to read upload part {part} for {class}.{method}: {reason}")]
    UploadReadFailure {
        /// Target class.
        class: ClassName,
        /// Target method.
        method: MethodName,
        /// Upload parameter.
        param: String,
        /// Part name.
        part: String,
        /// Read failure description.
        reason: String,
    },
    /// More than one file supplied for a singular file parameter.
    #[error("too many files for {param} on {class}.{method}: {count}")]
    TooManyFiles {
        /// Target class.
        class: ClassName,
        /// Target method.
        method: MethodName,
        /// Upload parameter.
        param: String,
        /// Declared file count.
        count: usize,
    },
    /// Access policy denied the call.
    #[error("access denied for {class}.{method}")]
    AccessDenied {
        /// Target class.
        class: ClassName,
        /// Target method.
        method: MethodName,
    },
    /// Target reported constraint violations.
    #[error("validation failed: {}", .messages.join("; "))]
    ValidationFailure {
        /// Violation messages.
        messages: Vec<String>,
    },
    /// Target raised a failure.
    #[error("invocation of {class}.{method} failed: {}", .failure.message())]
    InvocationFailure {
        /// Target class.
        class: ClassName,
        /// Target method.
        method: MethodName,
        /// Unwrapped failure.
        failure: RaisedFailure,
    },
    /// Result could not be converted to JSON.
    #[error("result conversion failed: {reason}")]
    ResultConversion {
        /// Serialization failure.
        reason: String,
    },
}

impl CallError {
    /// Converts a target failure after unwrapping one wrapper level.
    #[must_use]
    pub fn from_target(class: &ClassName, method: &MethodName, error: TargetError) -> Self {
        match error.unwrap_once() {
            TargetError::ValidationFailure {
                messages,
            } => Self::ValidationFailure {
                messages,
            },
            other => Self::InvocationFailure {
                class: class.clone(),
                method: method.clone(),
                failure: other.into_raised(),
            },
        }
    }

    /// Returns the stable taxonomy label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRoute(_) => "MalformedRoute",
            Self::MalformedBody {
                ..
            } => "MalformedBody",
            Self::MissingParameter {
                ..
            } => "MissingParameter",
            Self::InvalidParameter {
                ..
            } => "InvalidParameter",
            Self::UploadCorrupted {
                ..
            } => "UploadCorrupted",
            Self::UploadReadFailure {
                ..
            } => "UploadReadFailure",
            Self::TooManyFiles {
                ..
            } => "TooManyFiles",
            Self::AccessDenied {
                ..
            } => "AccessDenied",
            Self::ValidationFailure {
                ..
            } => "ValidationFailure",
            Self::InvocationFailure {
                ..
            } => "InvocationFailure",
            Self::ResultConversion {
                ..
            } => "ResultConversion",
        }
    }

    /// Returns the envelope `type` reported to the client.
    #[must_use]
    pub fn envelope_type(&self) -> String {
        match self {
            Self::ValidationFailure {
                ..
            } => VALIDATION_FAILURE_TYPE.to_string(),
            Self::InvocationFailure {
                failure, ..
            } => failure.kind().to_string(),
            other => other.kind().to_string(),
        }
    }

    /// Returns the envelope `details` reported to the client.
    #[must_use]
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            Self::ValidationFailure {
                messages,
            } => {
                details.insert(
                    "messages".to_string(),
                    Value::Array(messages.iter().cloned().map(Value::String).collect()),
                );
            }
            Self::InvocationFailure {
                failure, ..
            } => return failure.details(),
            Self::MissingParameter {
                class,
                method,
                param,
            }
            | Self::InvalidParameter {
                class,
                method,
                param,
                ..
            }
            | Self::UploadCorrupted {
                class,
                method,
                param,
                ..
            }
            | Self::UploadReadFailure {
                class,
                method,
                param,
                ..
            }
            | Self::TooManyFiles {
                class,
                method,
                param,
                ..
            } => {
                details.insert("message".to_string(), Value::String(self.to_string()));
                details.insert("class".to_string(), Value::String(class.to_string()));
                details.insert("method".to_string(), Value::String(method.to_string()));
                details.insert("param".to_string(), Value::String(param.clone()));
            }
            Self::AccessDenied {
                class,
                method,
            } => {
                details.insert("message".to_string(), Value::String(self.to_string()));
                details.insert("class".to_string(), Value::String(class.to_string()));
                details.insert("method".to_string(), Value::String(method.to_string()));
            }
            Self::MalformedRoute(_)
            | Self::MalformedBody {
                ..
            }
            | Self::ResultConversion {
                ..
            } => {
                details.insert("message".to_string(), Value::String(self.to_string()));
            }
        }
        details
    }

    /// Returns the HTTP status this failure maps to.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::MalformedRoute(_) => 400,
            Self::AccessDenied {
                ..
            } => 403,
            _ => 500,
        }
    }
}
