//! MCP server implementation for geoloc-mcp.
//!
//! This crate wires the location control plane into rmcp tool handlers and
//! exposes the stdio and streamable HTTP runners.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use geoloc_core::control::LocationControlPlane;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use surrealdb::Connection;

pub use tools::context::{HelpPayload, ToolSummary};

const SERVER_INSTRUCTIONS: &str = r#"geoloc-mcp resolves place names to enriched location records.

Workflow:
1. Resolve a name with a category tool when you know what it is:
   `search_cities`, `search_mountains`, `search_peaks`, `search_natural_sites`, `search_cultural_sites`.
   Use `search_location` with an optional `type` (e.g. `peak`, `castle`) otherwise.
2. Use the `search_all_*` variants to get every match instead of the best one.
3. Records are cached after the first resolution. Read them back with
   `get_location_by_id` (optionally scoped by `collection`) or browse with `list_locations`.

Notes:
- Collections: cities, mountains, peaks, natural_sites, cultural_sites.
- `provenance` is `cache` for stored records and `freshly_resolved` for new ones.
- Errors are returned as `{ "error": message }` tool results.
- Use `help` for the tool list and the collection/type table. `health` returns `ok`."#;

/// MCP server wrapper around the location control plane and tool routers.
#[derive(Clone)]
pub struct GeolocMcp<C: Connection> {
    tool_router: ToolRouter<Self>,
    control: Arc<LocationControlPlane<C>>,
}

impl<C: Connection> GeolocMcp<C> {
    /// Creates a new server owning the control plane.
    #[must_use]
    pub fn new(control: LocationControlPlane<C>) -> Self {
        Self::with_control(Arc::new(control))
    }

    /// Creates a new server using a shared control plane handle.
    #[must_use]
    pub fn with_control(control: Arc<LocationControlPlane<C>>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_search()
            + Self::tool_router_data()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
        }
    }

    pub(crate) fn control(&self) -> &LocationControlPlane<C> {
        &self.control
    }

    /// Names of every registered tool, sorted.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        names
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<C: Connection> GeolocMcp<C> {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl<C: Connection> ServerHandler for GeolocMcp<C> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
