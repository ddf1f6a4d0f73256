//! Webstack AWS Provider
//!
//! Schemas for the `aws:*` resource types and lookup functions

pub mod schemas;

pub use schemas::all_schemas;

/// Provider prefix of every AWS type token
pub const PROVIDER: &str = "aws";
