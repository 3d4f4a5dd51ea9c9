// crates/callgate-core/src/runtime/mod.rs
// ============================================================================
// Module: Callgate Runtime
// Description: Registry, binder, pipeline, and serializer.
// Purpose: Execute one RPC call from bound body to encoded envelope.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules are synchronous and hold no per-request state of their
//! own. The frozen registry is the only value shared across requests.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod binder;
pub mod pipeline;
pub mod registry;
pub mod serializer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use binder::ARGS_PART;
pub use binder::MAX_UPLOAD_FILES;
pub use binder::ParameterBinder;
pub use binder::RequestBody;
pub use binder::UPLOADS_PART;
pub use binder::coerce;
pub use pipeline::InvocationPipeline;
pub use registry::CallableRegistry;
pub use registry::CallableRegistryBuilder;
pub use serializer::FailureEnvelope;
pub use serializer::INVOKE_KEY;
pub use serializer::JSON_CONTENT_TYPE;
pub use serializer::ResultSerializer;
pub use serializer::SerializedResponse;
pub use serializer::SuccessEnvelope;
pub use serializer::TEMPLATE_DATA_KEY;
pub use serializer::serialize_result;
