//! Webstack Core
//!
//! Core library for declaring cloud infrastructure as a typed, validated
//! resource graph that an external apply engine consumes.

pub mod config;
pub mod graph;
pub mod render;
pub mod resource;
pub mod schema;
pub mod stack;
