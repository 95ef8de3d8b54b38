use geoloc_core::router::types_for;
use geoloc_store::Partition;
use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use surrealdb::Connection;

use crate::GeolocMcp;

/// One registered tool.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

/// Location types routed to one collection.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CollectionTypes {
    pub collection: String,
    pub types: Vec<String>,
}

/// Payload returned by `help`.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpPayload {
    pub tools: Vec<ToolSummary>,
    pub collections: Vec<CollectionTypes>,
}

impl HelpPayload {
    fn collections() -> Vec<CollectionTypes> {
        Partition::ALL
            .into_iter()
            .map(|partition| CollectionTypes {
                collection: partition.to_string(),
                types: types_for(partition)
                    .into_iter()
                    .map(|kind| kind.to_string())
                    .collect(),
            })
            .collect()
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl<C: Connection> GeolocMcp<C> {
    #[tool(description = "List the available tools and which location types each collection holds.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        let mut tools: Vec<ToolSummary> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| ToolSummary {
                name: tool.name.to_string(),
                description: tool
                    .description
                    .map(|description| description.to_string())
                    .unwrap_or_default(),
            })
            .collect();
        tools.sort_by(|left, right| left.name.cmp(&right.name));
        let payload = HelpPayload {
            tools,
            collections: HelpPayload::collections(),
        };
        Ok(CallToolResult::success(vec![Content::json(payload)?]))
    }
}
