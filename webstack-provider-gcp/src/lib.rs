//! Webstack Google Cloud Provider
//!
//! Schemas for the `gcp:*` resource types used by the notification pipeline

pub mod schemas;

pub use schemas::all_schemas;

/// Provider prefix of every Google Cloud type token
pub const PROVIDER: &str = "gcp";
