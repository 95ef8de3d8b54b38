//! Storage models and partition schema for geoloc-mcp.
//!
//! This crate defines the canonical location record shared by the feature
//! adapters, the resolution pipeline, and the storage backend.

pub mod models;
pub mod schema;

pub use models::*;
pub use schema::{LocationType, Partition, UnknownVariant};
