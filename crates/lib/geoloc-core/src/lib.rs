//! Core services for geoloc-mcp.
//!
//! This crate owns the location resolution pipeline: the Overpass feature
//! source, the Wikipedia and Wikidata enrichment adapters, the validation gate,
//! the category router, and the `SurrealDB` backing store.

pub mod control;
pub mod enrich;
pub mod overpass;
pub mod router;
pub mod services;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod upstream;
pub mod validate;
