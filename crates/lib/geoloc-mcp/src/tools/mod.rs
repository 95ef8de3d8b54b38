//! MCP tool modules.
//!
//! Tools are grouped by domain: name resolution, stored-record access, and
//! contextual help.

pub mod context;
pub mod data;
pub mod search;
