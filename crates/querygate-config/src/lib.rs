// crates/querygate-config/src/lib.rs
// ============================================================================
// Module: QueryGate Config Library
// Description: Canonical config model and validation for the gateway.
// Purpose: Single source of truth for querygate.toml semantics.
// Dependencies: querygate-core, serde, toml
// ============================================================================

//! ## Overview
//! `querygate-config` defines the configuration model for the query gateway.
//! It loads `querygate.toml` under hard size and path limits, validates every
//! section fail-closed, and converts the result into the core
//! [`querygate_core::GatewayConfig`] plus the configured audit sink.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
