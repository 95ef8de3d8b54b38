use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use surrealdb::Connection;

use crate::{GeolocMcp, helpers};

/// Parameters for fetching a stored location.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetLocationParams {
    #[serde(default)]
    pub id: String,
    /// Collection to read from; every collection is probed when omitted.
    pub collection: Option<String>,
}

/// Parameters for listing stored locations.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListLocationsParams {
    pub collection: Option<String>,
    /// Maximum number of records, default 50.
    pub limit: Option<usize>,
    #[serde(default, rename = "type")]
    pub location_type: Option<String>,
}

#[tool_router(router = tool_router_data, vis = "pub")]
impl<C: Connection> GeolocMcp<C> {
    #[tool(description = "Fetch a stored location by id, optionally from one collection.")]
    async fn get_location_by_id(
        &self,
        Parameters(params): Parameters<GetLocationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .control()
            .get_location_by_id(&params.id, params.collection.as_deref())
            .await;
        helpers::tool_result("get_location_by_id", result)
    }

    #[tool(description = "List stored locations ordered by name, filtered by collection and type.")]
    async fn list_locations(
        &self,
        Parameters(params): Parameters<ListLocationsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .control()
            .list_locations(
                params.collection.as_deref(),
                params.location_type.as_deref(),
                params.limit,
            )
            .await;
        helpers::tool_result("list_locations", result)
    }
}
