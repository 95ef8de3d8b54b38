//! Store interfaces and `SurrealDB` implementation.
//!
//! One table per partition; rows are written once and never updated.

pub mod surreal;

pub use surreal::{StoreError, StoreResult, SurrealLocationStore};
