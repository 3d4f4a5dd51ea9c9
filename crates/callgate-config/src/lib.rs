// crates/callgate-config/src/lib.rs
// ============================================================================
// Module: Callgate Config Library
// Description: Canonical gateway config model and validation.
// Purpose: Single source of truth for callgate.toml semantics.
// Dependencies: callgate-core, serde, toml
// ============================================================================

//! ## Overview
//! `callgate-config` defines the configuration model for the gateway server
//! and CLI. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
