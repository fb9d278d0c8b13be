//! Domain model for jobtrace
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{JobNumber, Pid};

pub use errors::TraceError;

/// Result alias used across the controller library
pub type Result<T, E = TraceError> = std::result::Result<T, E>;
