// crates/callgate-core/src/core/descriptor.rs
// ============================================================================
// Module: Callable Descriptors
// Description: Descriptor tables for callable classes, methods, and params.
// Purpose: Describe invocable targets without runtime type introspection.
// Dependencies: crate::core::identifiers, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! Descriptors are built once at startup and never mutated afterwards. A
//! [`CallableClass`] owns the shared target instance and a table of
//! [`CallableMethod`] entries; each method declares an ordered list of
//! [`ParamSpec`] values that drive presence checks and coercion during binding.
//!
//! ## Invariants
//! - Parameter names are unique within a method.
//! - Method names are unique within a class.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ClassName;
use crate::core::identifiers::MethodName;
use crate::interfaces::Callable;

// ============================================================================
// SECTION: Parameter Types
// ============================================================================

/// Declared semantic type of a callable parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// Any JSON value, bound as-is.
    Any,
    /// Boolean value.
    Bool,
    /// Signed or unsigned integer.
    Integer,
    /// Floating point number.
    Float,
    /// UTF-8 string.
    String,
    /// JSON object decoded by the callable into its own type.
    Object,
    /// Structured value converted into a Rust type while binding.
    Typed(TypedShape),
    /// Homogeneous array of the inner type.
    Array(Box<ParamType>),
    /// Single uploaded file.
    File,
    /// One or more uploaded files.
    FileArray,
}

impl ParamType {
    /// Returns an array type wrapping `inner`.
    #[must_use]
    pub fn array_of(inner: Self) -> Self {
        Self::Array(Box::new(inner))
    }

    /// Returns a structured type converted through `T` at bind time.
    ///
    /// A wire value that does not deserialize into `T` fails binding like any
    /// other coercion failure.
    #[must_use]
    pub fn typed<T>() -> Self
    where
        T: DeserializeOwned + Serialize,
    {
        Self::Typed(TypedShape {
            label: std::any::type_name::<T>(),
            convert: convert_through::<T>,
        })
    }

    /// Returns true when the parameter is bound from file uploads.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File | Self::FileArray)
    }

    /// Returns true when the parameter accepts multiple values.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_) | Self::FileArray)
    }

    /// Returns a stable label used in error details.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Any => "any".to_string(),
            Self::Bool => "bool".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Float => "float".to_string(),
            Self::String => "string".to_string(),
            Self::Object => "object".to_string(),
            Self::Typed(shape) => shape.label.to_string(),
            Self::Array(inner) => format!("array<{}>", inner.label()),
            Self::File => "file".to_string(),
            Self::FileArray => "array<file>".to_string(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Serde conversion backing [`ParamType::Typed`].
#[derive(Clone, Copy)]
pub struct TypedShape {
    /// Rust type name reported in error details.
    label: &'static str,
    /// Round-trips a wire value through the declared type.
    convert: fn(&Value) -> Result<Value, String>,
}

impl TypedShape {
    /// Returns the declared type name.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Converts a wire value into the declared type and back into JSON.
    ///
    /// # Errors
    ///
    /// Returns the deserializer message when the value does not fit the type.
    pub fn convert(&self, value: &Value) -> Result<Value, String> {
        (self.convert)(value)
    }
}

impl fmt::Debug for TypedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedShape").field("label", &self.label).finish_non_exhaustive()
    }
}

impl PartialEq for TypedShape {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for TypedShape {}

/// Deserializes `value` into `T` and re-encodes it.
fn convert_through<T>(value: &Value) -> Result<Value, String>
where
    T: DeserializeOwned + Serialize,
{
    let typed = T::deserialize(value).map_err(|err| err.to_string())?;
    serde_json::to_value(typed).map_err(|err| err.to_string())
}

/// Declared parameter of a callable method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name, unique within the method.
    name: String,
    /// Declared parameter type.
    param_type: ParamType,
    /// Whether the parameter may be bound to null.
    nullable: bool,
}

impl ParamSpec {
    /// Declares a required (non-nullable) parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            nullable: false,
        }
    }

    /// Declares a nullable parameter.
    #[must_use]
    pub fn nullable(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            nullable: true,
        }
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn param_type(&self) -> &ParamType {
        &self.param_type
    }

    /// Returns true when the parameter may be null.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }
}

// ============================================================================
// SECTION: Method Descriptors
// ============================================================================

/// Descriptor of an invocable method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableMethod {
    /// Method name.
    name: MethodName,
    /// Ordered parameter declarations.
    params: Vec<ParamSpec>,
}

impl CallableMethod {
    /// Builds a method descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateParam`] when two parameters share a name.
    pub fn new(
        name: impl Into<MethodName>,
        params: impl IntoIterator<Item = ParamSpec>,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let params: Vec<ParamSpec> = params.into_iter().collect();
        let mut seen = BTreeSet::new();
        for param in &params {
            if !seen.insert(param.name()) {
                return Err(RegistryError::DuplicateParam {
                    method: name.clone(),
                    param: param.name().to_string(),
                });
            }
        }
        Ok(Self {
            name,
            params,
        })
    }

    /// Returns the method name.
    #[must_use]
    pub const fn name(&self) -> &MethodName {
        &self.name
    }

    /// Returns the ordered parameter declarations.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

// ============================================================================
// SECTION: Class Descriptors
// ============================================================================

/// Descriptor of a registered callable class.
#[derive(Clone)]
pub struct CallableClass {
    /// Class name used as the registry key.
    name: ClassName,
    /// Shared target instance.
    target: Arc<dyn Callable>,
    /// Method table keyed by method name.
    methods: BTreeMap<MethodName, CallableMethod>,
}

impl CallableClass {
    /// Creates a class descriptor with no methods.
    #[must_use]
    pub fn new(name: impl Into<ClassName>, target: Arc<dyn Callable>) -> Self {
        Self {
            name: name.into(),
            target,
            methods: BTreeMap::new(),
        }
    }

    /// Adds a method descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] when the method is already declared.
    pub fn with_method(mut self, method: CallableMethod) -> Result<Self, RegistryError> {
        if self.methods.contains_key(method.name()) {
            return Err(RegistryError::DuplicateMethod {
                class: self.name,
                method: method.name().clone(),
            });
        }
        self.methods.insert(method.name().clone(), method);
        Ok(self)
    }

    /// Returns the class name.
    #[must_use]
    pub const fn name(&self) -> &ClassName {
        &self.name
    }

    /// Returns the shared target instance.
    #[must_use]
    pub fn target(&self) -> &dyn Callable {
        self.target.as_ref()
    }

    /// Looks up a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&CallableMethod> {
        self.methods.get(name)
    }

    /// Returns true when the class declares the method.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Iterates over declared methods in name order.
    pub fn methods(&self) -> impl Iterator<Item = &CallableMethod> {
        self.methods.values()
    }
}

impl fmt::Debug for CallableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableClass")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building descriptors or the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Class name registered twice.
    #[error("callable class already registered: {0}")]
    DuplicateClass(ClassName),
    /// Method declared twice on one class.
    #[error("method {method} already declared on {class}")]
    DuplicateMethod {
        /// Owning class.
        class: ClassName,
        /// Duplicated method.
        method: MethodName,
    },
    /// Parameter declared twice on one method.
    #[error("parameter {param} already declared on {method}")]
    DuplicateParam {
        /// Owning method.
        method: MethodName,
        /// Duplicated parameter.
        param: String,
    },
    /// Class or method name is empty or contains the route separator.
    #[error("invalid callable name: {0}")]
    InvalidName(String),
}
