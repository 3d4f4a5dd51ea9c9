// crates/callgate-core/src/core/mod.rs
// ============================================================================
// Module: Callgate Core Types
// Description: Data model for callable descriptors, values, and envelopes.
// Purpose: Group the pure types shared by the runtime and the host adapters.
// Dependencies: serde, serde_json, thiserror, base64, bytes
// ============================================================================

//! ## Overview
//! Core types carry no I/O. They describe what can be called, how a request
//! addresses it, and what a single invocation looks like while in flight.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod identifiers;
pub mod route;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use descriptor::CallableClass;
pub use descriptor::CallableMethod;
pub use descriptor::ParamSpec;
pub use descriptor::ParamType;
pub use descriptor::RegistryError;
pub use descriptor::TypedShape;
pub use envelope::CallContext;
pub use envelope::CallEnvelope;
pub use envelope::CallPhase;
pub use envelope::PhaseMarker;
pub use error::CallError;
pub use error::NOISE_FIELDS;
pub use error::RaisedFailure;
pub use error::TargetError;
pub use error::VALIDATION_FAILURE_TYPE;
pub use identifiers::CallTarget;
pub use identifiers::ClassName;
pub use identifiers::MethodName;
pub use route::DEFAULT_ROUTE_PREFIX;
pub use route::ROUTE_SEPARATOR;
pub use route::RouteDecoder;
pub use route::RouteError;
pub use value::Binding;
pub use value::BoundArguments;
pub use value::FileUpload;
pub use value::FormPart;
pub use value::MultipartForm;
pub use value::UPLOAD_PLACEHOLDER_PREFIX;
pub use value::WireValue;
pub use value::upload_part_name;
