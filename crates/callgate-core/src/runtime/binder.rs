// crates/callgate-core/src/runtime/binder.rs
// ============================================================================
// Module: Parameter Binder
// Description: Binds JSON or multipart request bodies to declared parameters.
// Purpose: Turn untrusted wire values into a typed argument map.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! The binder walks a method's [`ParamSpec`] list in declaration order. Every
//! wire value is classified into a [`WireValue`] first; upload placeholders
//! are resolved against the multipart manifest before any generic coercion.
//!
//! [`ParamType::Typed`] parameters are converted through their serde type
//! here, so a shape mismatch is a binding failure rather than a target one.
//!
//! Nullable parameters whose value fails coercion are bound as
//! [`Binding::CoercionFallback`] so callers can tell them apart from values
//! that were simply absent.
//!
//! Security posture: request bodies are untrusted; upload counts are bounded
//! by [`MAX_UPLOAD_FILES`] before any part is read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

use crate::core::descriptor::CallableMethod;
use crate::core::descriptor::ParamSpec;
use crate::core::descriptor::ParamType;
use crate::core::error::CallError;
use crate::core::identifiers::CallTarget;
use crate::core::value::Binding;
use crate::core::value::BoundArguments;
use crate::core::value::FileUpload;
use crate::core::value::WireValue;
use crate::core::value::upload_part_name;
use crate::interfaces::UploadSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved multipart part holding the ordinary arguments.
pub const ARGS_PART: &str = "$args";

/// Reserved multipart part holding the upload manifest.
pub const UPLOADS_PART: &str = "$uploads";

/// Maximum number of files accepted for one upload field.
pub const MAX_UPLOAD_FILES: usize = 256;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Request body in one of the supported wire shapes.
#[derive(Clone, Copy)]
pub enum RequestBody<'a> {
    /// Raw `application/json` body.
    Json(&'a [u8]),
    /// `multipart/form-data` body exposed through named parts.
    Multipart(&'a dyn UploadSource),
}

/// Parsed argument object plus optional upload manifest.
struct WireArguments<'a> {
    /// Ordinary arguments keyed by parameter name.
    args: Map<String, Value>,
    /// Upload manifest (multipart only).
    uploads: Option<Map<String, Value>>,
    /// Part accessor (multipart only).
    source: Option<&'a dyn UploadSource>,
}

// ============================================================================
// SECTION: Binder
// ============================================================================

/// Stateless parameter binder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterBinder;

impl ParameterBinder {
    /// Creates a binder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Binds a request body to the method's declared parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CallError`] for malformed bodies, missing or invalid
    /// parameters, and upload failures.
    pub fn bind(
        &self,
        target: &CallTarget,
        method: &CallableMethod,
        body: RequestBody<'_>,
    ) -> Result<BoundArguments, CallError> {
        let wire = parse_body(body)?;
        let mut bound = BoundArguments::new();
        for spec in method.params() {
            let binding = bind_param(target, spec, &wire)?;
            bound.insert(spec.name(), binding);
        }
        if let Some(reason) = wire.source.and_then(|source| source.truncated()) {
            return Err(malformed(format!("multipart body truncated: {reason}")));
        }
        Ok(bound)
    }
}

/// Parses the body into an argument object and optional manifest.
fn parse_body(body: RequestBody<'_>) -> Result<WireArguments<'_>, CallError> {
    match body {
        RequestBody::Json(bytes) => Ok(WireArguments {
            args: parse_object(bytes, "request body")?,
            uploads: None,
            source: None,
        }),
        RequestBody::Multipart(source) => {
            let args = source
                .part(ARGS_PART)
                .map_err(|err| malformed(format!("{ARGS_PART}: {err}")))?
                .ok_or_else(|| malformed(format!("missing {ARGS_PART} part")))?;
            let uploads = match source
                .part(UPLOADS_PART)
                .map_err(|err| malformed(format!("{UPLOADS_PART}: {err}")))?
            {
                Some(part) => parse_object(&part.data, UPLOADS_PART)?,
                None => Map::new(),
            };
            Ok(WireArguments {
                args: parse_object(&args.data, ARGS_PART)?,
                uploads: Some(uploads),
                source: Some(source),
            })
        }
    }
}

/// Parses bytes as a JSON object; an empty body is an empty object.
fn parse_object(bytes: &[u8], label: &str) -> Result<Map<String, Value>, CallError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(malformed(format!("{label} is not a json object"))),
        Err(err) => Err(malformed(format!("{label}: {err}"))),
    }
}

/// Builds a malformed-body error.
fn malformed(reason: String) -> CallError {
    CallError::MalformedBody {
        reason,
    }
}

/// Binds one declared parameter.
fn bind_param(
    target: &CallTarget,
    spec: &ParamSpec,
    wire: &WireArguments<'_>,
) -> Result<Binding, CallError> {
    match WireValue::classify(wire.args.get(spec.name())) {
        WireValue::Absent if spec.is_nullable() => Ok(Binding::Null),
        WireValue::Absent => Err(CallError::MissingParameter {
            class: target.class.clone(),
            method: target.method.clone(),
            param: spec.name().to_string(),
        }),
        WireValue::UploadPlaceholder(field) if spec.param_type().is_file() => {
            resolve_upload(target, spec, field, wire)
        }
        WireValue::UploadPlaceholder(_) => {
            coercion_failure(target, spec, "upload placeholder for a non-file parameter")
        }
        WireValue::Scalar(value) | WireValue::Structured(value) => {
            if let ParamType::Typed(shape) = spec.param_type() {
                return match shape.convert(value) {
                    Ok(converted) => Ok(Binding::Value(converted)),
                    Err(reason) => coercion_failure(target, spec, &reason),
                };
            }
            match coerce(value, spec.param_type()) {
                Some(coerced) => Ok(Binding::Value(coerced)),
                None => coercion_failure(target, spec, &format!("expected {}", spec.param_type())),
            }
        }
    }
}

/// Applies the nullable fallback or raises `InvalidParameter`.
fn coercion_failure(
    target: &CallTarget,
    spec: &ParamSpec,
    reason: &str,
) -> Result<Binding, CallError> {
    if spec.is_nullable() {
        return Ok(Binding::CoercionFallback {
            reason: reason.to_string(),
        });
    }
    Err(CallError::InvalidParameter {
        class: target.class.clone(),
        method: target.method.clone(),
        param: spec.name().to_string(),
        expected: spec.param_type().label(),
    })
}

// ============================================================================
// SECTION: Uploads
// ============================================================================

/// Resolves an upload placeholder into one or more files.
fn resolve_upload(
    target: &CallTarget,
    spec: &ParamSpec,
    field: &str,
    wire: &WireArguments<'_>,
) -> Result<Binding, CallError> {
    let corrupted = |reason: String| CallError::UploadCorrupted {
        class: target.class.clone(),
        method: target.method.clone(),
        param: spec.name().to_string(),
        reason,
    };
    let (Some(uploads), Some(source)) = (&wire.uploads, wire.source) else {
        return Err(corrupted("upload placeholder outside a multipart body".to_string()));
    };
    let declared =
        uploads.get(field).ok_or_else(|| corrupted(format!("no manifest entry for {field}")))?;
    let count = integral(declared)
        .ok_or_else(|| corrupted(format!("manifest count for {field} is not an integer")))?;
    if count < 1 {
        return Err(CallError::MissingParameter {
            class: target.class.clone(),
            method: target.method.clone(),
            param: spec.name().to_string(),
        });
    }
    let count = usize::try_from(count).unwrap_or(usize::MAX);
    if count > MAX_UPLOAD_FILES {
        return Err(corrupted(format!("manifest count {count} exceeds {MAX_UPLOAD_FILES}")));
    }

    let mut files = Vec::new();
    for index in 0 .. count {
        let part_name = upload_part_name(field, index);
        let read_failure = |reason: String| CallError::UploadReadFailure {
            class: target.class.clone(),
            method: target.method.clone(),
            param: spec.name().to_string(),
            part: part_name.clone(),
            reason,
        };
        match source.part(&part_name) {
            Ok(Some(part)) => files.push(FileUpload::from(part)),
            Ok(None) => return Err(read_failure("part missing".to_string())),
            Err(err) => return Err(read_failure(err.to_string())),
        }
    }

    if spec.param_type().is_array() {
        return Ok(Binding::Files(files));
    }
    if files.len() > 1 {
        return Err(CallError::TooManyFiles {
            class: target.class.clone(),
            method: target.method.clone(),
            param: spec.name().to_string(),
            count,
        });
    }
    files.pop().map(Binding::File).ok_or_else(|| corrupted("no file resolved".to_string()))
}

// ============================================================================
// SECTION: Coercion
// ============================================================================

/// Coerces a wire value into the declared type, `None` when incompatible.
#[must_use]
pub fn coerce(value: &Value, param_type: &ParamType) -> Option<Value> {
    match (param_type, value) {
        (ParamType::Any, _)
        | (ParamType::Bool, Value::Bool(_))
        | (ParamType::String, Value::String(_))
        | (ParamType::Object, Value::Object(_)) => Some(value.clone()),
        (ParamType::Bool, Value::String(text)) => text.trim().parse::<bool>().ok().map(Value::Bool),
        (ParamType::Integer, Value::Number(_)) => integral(value).map(Value::from),
        (ParamType::Integer, Value::String(text)) => {
            text.trim().parse::<i64>().ok().map(Value::from)
        }
        (ParamType::Float, Value::Number(_)) => Some(value.clone()),
        (ParamType::Float, Value::String(text)) => {
            text.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
        }
        (ParamType::String, Value::Number(number)) => Some(Value::String(number.to_string())),
        (ParamType::String, Value::Bool(flag)) => Some(Value::String(flag.to_string())),
        (ParamType::Typed(shape), _) => shape.convert(value).ok(),
        (ParamType::Array(inner), Value::Array(items)) => {
            items.iter().map(|item| coerce(item, inner)).collect::<Option<Vec<_>>>().map(Value::Array)
        }
        _ => None,
    }
}

/// Returns the integer value of a JSON number, accepting integral floats.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "Float is checked integral and within i64 range before the cast."
)]
fn integral(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(int) = number.as_i64() {
        return Some(int);
    }
    let float = number.as_f64()?;
    let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;
    (float.fract() == 0.0 && in_range).then_some(float as i64)
}
