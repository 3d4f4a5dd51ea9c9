// crates/callgate-core/src/core/value.rs
// ============================================================================
// Module: Wire and Bound Values
// Description: Tagged wire values, uploaded files, and bound call arguments.
// Purpose: Separate untyped request values from the typed arguments a call sees.
// Dependencies: bytes, serde, serde_json
// ============================================================================

//! ## Overview
//! Request values arrive untyped. [`WireValue`] classifies each raw JSON value
//! before coercion so upload placeholders are resolved explicitly instead of
//! through scattered string checks. The binder produces [`BoundArguments`],
//! which keeps a coercion fallback distinguishable from a genuinely absent
//! value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;

use crate::core::error::RaisedFailure;
use crate::core::error::TargetError;
use crate::interfaces::PartError;
use crate::interfaces::UploadSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix marking a string value as an upload placeholder.
pub const UPLOAD_PLACEHOLDER_PREFIX: &str = "$$$upload:";

/// Returns the part name for the `index`-th file of an upload field.
#[must_use]
pub fn upload_part_name(field: &str, index: usize) -> String {
    format!("{field}_file_{index}")
}

// ============================================================================
// SECTION: Wire Values
// ============================================================================

/// Classified wire value awaiting coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireValue<'a> {
    /// Field missing or explicitly null.
    Absent,
    /// Primitive JSON value (bool, number, string).
    Scalar(&'a Value),
    /// Structured JSON value (object or array).
    Structured(&'a Value),
    /// Reference to an upload field that must be resolved from form parts.
    UploadPlaceholder(&'a str),
}

impl<'a> WireValue<'a> {
    /// Classifies a raw JSON field value.
    #[must_use]
    pub fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(scalar @ Value::String(text)) => text
                .strip_prefix(UPLOAD_PLACEHOLDER_PREFIX)
                .map_or(Self::Scalar(scalar), Self::UploadPlaceholder),
            Some(value @ (Value::Object(_) | Value::Array(_))) => Self::Structured(value),
            Some(value) => Self::Scalar(value),
        }
    }
}

// ============================================================================
// SECTION: Form Parts
// ============================================================================

/// One decoded multipart form part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// Form field name.
    pub name: String,
    /// Client-supplied file name, when present.
    pub file_name: Option<String>,
    /// Declared content type, when present.
    pub content_type: Option<String>,
    /// Part payload.
    pub data: Bytes,
}

impl FormPart {
    /// Creates a plain form part.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: data.into(),
        }
    }

    /// Returns a copy with the file name set.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Returns a copy with the content type set.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// In-memory multipart form collected by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    /// Parts keyed by field name.
    parts: BTreeMap<String, FormPart>,
    /// Fields whose payload could not be read.
    failures: BTreeMap<String, String>,
    /// Set when the body ended before its closing boundary.
    truncated: Option<String>,
}

impl MultipartForm {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a part, replacing any earlier part with the same name.
    pub fn insert(&mut self, part: FormPart) {
        self.failures.remove(&part.name);
        self.parts.insert(part.name.clone(), part);
    }

    /// Records a part that was present but could not be read.
    pub fn insert_failure(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        let name = name.into();
        self.parts.remove(&name);
        self.failures.insert(name, reason.into());
    }

    /// Records that the body could not be read to the end.
    pub fn mark_truncated(&mut self, reason: impl Into<String>) {
        self.truncated = Some(reason.into());
    }

    /// Returns a copy with the part added.
    #[must_use]
    pub fn with_part(mut self, part: FormPart) -> Self {
        self.insert(part);
        self
    }

    /// Returns the number of readable parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true when the form has no readable parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl UploadSource for MultipartForm {
    fn part(&self, name: &str) -> Result<Option<FormPart>, PartError> {
        if let Some(reason) = self.failures.get(name) {
            return Err(PartError::Read(reason.clone()));
        }
        Ok(self.parts.get(name).cloned())
    }

    fn truncated(&self) -> Option<&str> {
        self.truncated.as_deref()
    }
}

// ============================================================================
// SECTION: File Uploads
// ============================================================================

/// Uploaded file bound to a call argument.
///
/// The payload is owned by the request and dropped with it on every exit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Generated part name (`<field>_file_<index>`).
    part_name: String,
    /// Client-supplied file name.
    file_name: Option<String>,
    /// Declared content type.
    content_type: Option<String>,
    /// File payload.
    data: Bytes,
}

impl FileUpload {
    /// Returns the part name this file was read from.
    #[must_use]
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Returns the client-supplied file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the declared content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the file payload.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a JSON summary without the payload.
    #[must_use]
    pub fn summary(&self) -> Value {
        let mut summary = Map::new();
        summary.insert("part".to_string(), Value::String(self.part_name.clone()));
        summary.insert("size".to_string(), Value::from(self.data.len()));
        if let Some(file_name) = &self.file_name {
            summary.insert("file_name".to_string(), Value::String(file_name.clone()));
        }
        if let Some(content_type) = &self.content_type {
            summary.insert("content_type".to_string(), Value::String(content_type.clone()));
        }
        Value::Object(summary)
    }
}

impl From<FormPart> for FileUpload {
    fn from(part: FormPart) -> Self {
        Self {
            part_name: part.name,
            file_name: part.file_name,
            content_type: part.content_type,
            data: part.data,
        }
    }
}

// ============================================================================
// SECTION: Bound Arguments
// ============================================================================

/// Result of binding one declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Coerced JSON value.
    Value(Value),
    /// Parameter absent (nullable).
    Null,
    /// Nullable parameter whose value failed coercion and was bound as null.
    CoercionFallback {
        /// Why coercion failed.
        reason: String,
    },
    /// Single uploaded file.
    File(FileUpload),
    /// Uploaded file array.
    Files(Vec<FileUpload>),
}

impl Binding {
    /// Returns true when the binding carries no value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::CoercionFallback { .. })
    }

    /// Returns a JSON rendering (files are summarized).
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Null | Self::CoercionFallback { .. } => Value::Null,
            Self::File(file) => file.summary(),
            Self::Files(files) => Value::Array(files.iter().map(FileUpload::summary).collect()),
        }
    }
}

/// Name → binding map handed to a callable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    /// Bindings keyed by parameter name.
    bindings: BTreeMap<String, Binding>,
}

impl BoundArguments {
    /// Creates an empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a binding.
    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    /// Returns a copy with the value bound.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, Binding::Value(value));
        self
    }

    /// Returns the binding for a parameter.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Returns the JSON value bound to a parameter, if any.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(Binding::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the string bound to a parameter, if any.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// Returns true when the parameter is bound to null or missing.
    #[must_use]
    pub fn is_null(&self, name: &str) -> bool {
        self.bindings.get(name).is_none_or(Binding::is_null)
    }

    /// Returns the single file bound to a parameter.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FileUpload> {
        match self.bindings.get(name) {
            Some(Binding::File(file)) => Some(file),
            _ => None,
        }
    }

    /// Returns the files bound to a parameter (a single file yields one entry).
    #[must_use]
    pub fn files(&self, name: &str) -> Option<&[FileUpload]> {
        match self.bindings.get(name) {
            Some(Binding::Files(files)) => Some(files),
            Some(Binding::File(file)) => Some(std::slice::from_ref(file)),
            _ => None,
        }
    }

    /// Decodes a bound value into a typed argument.
    ///
    /// Null bindings decode from JSON `null`, so `Option<T>` targets work for
    /// nullable parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when the value does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<T, TargetError> {
        let value = self.value(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|err| {
            TargetError::Raised(
                RaisedFailure::new("ArgumentDecodeError", err.to_string())
                    .with_field("param", Value::String(name.to_string())),
            )
        })
    }

    /// Iterates over parameter names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Returns a JSON object rendering of all bindings.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.bindings.iter().map(|(name, binding)| (name.clone(), binding.to_json())).collect(),
        )
    }
}
