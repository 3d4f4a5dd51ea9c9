// crates/callgate-core/src/lib.rs
// ============================================================================
// Module: Callgate Core Library
// Description: Public API surface for the Callgate dispatch core.
// Purpose: Expose core types, collaborator interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Callgate core resolves a named callable, binds untrusted request values to
//! its declared parameters, runs it through an interceptable pipeline, and
//! encodes the outcome as a JSON envelope. It performs no I/O and knows
//! nothing about HTTP; transport adapters supply bodies and upload parts
//! through [`interfaces::UploadSource`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::AccessPolicy;
pub use interfaces::CallInterceptor;
pub use interfaces::CallView;
pub use interfaces::Callable;
pub use interfaces::InterceptOutcome;
pub use interfaces::PartError;
pub use interfaces::UploadSource;
pub use runtime::ARGS_PART;
pub use runtime::CallableRegistry;
pub use runtime::CallableRegistryBuilder;
pub use runtime::FailureEnvelope;
pub use runtime::INVOKE_KEY;
pub use runtime::InvocationPipeline;
pub use runtime::JSON_CONTENT_TYPE;
pub use runtime::MAX_UPLOAD_FILES;
pub use runtime::ParameterBinder;
pub use runtime::RequestBody;
pub use runtime::ResultSerializer;
pub use runtime::SerializedResponse;
pub use runtime::SuccessEnvelope;
pub use runtime::TEMPLATE_DATA_KEY;
pub use runtime::UPLOADS_PART;
pub use runtime::coerce;
pub use runtime::serialize_result;
