use geoloc_store::Partition;
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

/// Parameters for category-scoped resolution.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchParams {
    /// Place name to resolve.
    #[serde(default)]
    pub name: String,
}

/// Parameters for generic resolution with an optional type.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchLocationParams {
    /// Place name to resolve.
    #[serde(default)]
    pub name: String,
    /// Location type such as `city`, `peak` or `castle`.
    #[serde(default, rename = "type")]
    pub location_type: Option<String>,
}

impl<C: Connection> GeolocMcp<C> {
    async fn resolve_in(
        &self,
        tool: &'static str,
        partition: Partition,
        name: &str,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .control()
            .resolve_one(name, None, Some(partition.table()))
            .await;
        helpers::tool_result(tool, result)
    }

    async fn resolve_all_in(
        &self,
        tool: &'static str,
        partition: Partition,
        name: &str,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .control()
            .resolve_all(name, None, Some(partition.table()))
            .await;
        helpers::tool_result(tool, result)
    }
}

#[tool_router(router = tool_router_search, vis = "pub")]
impl<C: Connection> GeolocMcp<C> {
    #[tool(description = "Resolve a city, town or village by name.")]
    async fn search_cities(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_in("search_cities", Partition::Cities, &params.name)
            .await
    }

    #[tool(description = "Resolve a mountain range by name.")]
    async fn search_mountains(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_in("search_mountains", Partition::Mountains, &params.name)
            .await
    }

    #[tool(description = "Resolve a mountain peak by name.")]
    async fn search_peaks(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_in("search_peaks", Partition::Peaks, &params.name)
            .await
    }

    #[tool(description = "Resolve a natural site (cave, waterfall, hut, viewpoint) by name.")]
    async fn search_natural_sites(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_in("search_natural_sites", Partition::NaturalSites, &params.name)
            .await
    }

    #[tool(description = "Resolve a cultural or historic site (castle, museum, monastery, church) by name.")]
    async fn search_cultural_sites(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_in("search_cultural_sites", Partition::CulturalSites, &params.name)
            .await
    }

    #[tool(description = "Resolve any location by name. Without a type, places are tried first, then natural features, then cultural sites.")]
    async fn search_location(
        &self,
        Parameters(params): Parameters<SearchLocationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .control()
            .resolve_one(&params.name, params.location_type.as_deref(), None)
            .await;
        helpers::tool_result("search_location", result)
    }

    #[tool(description = "Resolve every city, town or village matching a name.")]
    async fn search_all_cities(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_all_in("search_all_cities", Partition::Cities, &params.name)
            .await
    }

    #[tool(description = "Resolve every mountain range matching a name.")]
    async fn search_all_mountains(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_all_in("search_all_mountains", Partition::Mountains, &params.name)
            .await
    }

    #[tool(description = "Resolve every peak matching a name.")]
    async fn search_all_peaks(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_all_in("search_all_peaks", Partition::Peaks, &params.name)
            .await
    }

    #[tool(description = "Resolve every natural site matching a name.")]
    async fn search_all_natural_sites(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_all_in("search_all_natural_sites", Partition::NaturalSites, &params.name)
            .await
    }

    #[tool(description = "Resolve every cultural or historic site matching a name.")]
    async fn search_all_cultural_sites(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.resolve_all_in("search_all_cultural_sites", Partition::CulturalSites, &params.name)
            .await
    }

    #[tool(description = "Resolve every location matching a name, optionally restricted to a type.")]
    async fn search_all_locations(
        &self,
        Parameters(params): Parameters<SearchLocationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .control()
            .resolve_all(&params.name, params.location_type.as_deref(), None)
            .await;
        helpers::tool_result("search_all_locations", result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geoloc_core::test_support::{
        StubFactsSource,
        StubFeatureSource,
        StubNarrativeSource,
        feature,
        memory_control_plane,
    };
    use geoloc_store::{Coordinates, LocationType};
    use serde_json::Value;

    use super::*;

    fn payload(result: &CallToolResult) -> Value {
        let text = result.content[0]
            .as_text()
            .map(|content| content.text.clone())
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    async fn server(db: &str, features: Arc<StubFeatureSource>) -> GeolocMcp<surrealdb::engine::local::Db> {
        let control = memory_control_plane(
            db,
            features,
            Arc::new(StubNarrativeSource::new(None)),
            Arc::new(StubFactsSource::new(None)),
        )
        .await;
        GeolocMcp::new(control)
    }

    #[tokio::test]
    async fn category_tool_returns_record_json() {
        let features = Arc::new(StubFeatureSource::new(vec![feature(
            1,
            "Vitosha",
            LocationType::MountainRange,
            Coordinates::new(42.56, 23.28),
            &[("natural", "mountain_range")],
        )]));
        let mcp = server("tool_search", features.clone()).await;

        let result = mcp
            .search_mountains(Parameters(SearchParams {
                name: "Vitosha".to_string(),
            }))
            .await
            .unwrap();

        assert_ne!(result.is_error, Some(true));
        let body = payload(&result);
        assert_eq!(body["name"], "Vitosha");
        assert_eq!(body["partition"], "mountains");
        assert_eq!(body["provenance"], "freshly_resolved");
        assert_eq!(features.queried_keys(), vec!["natural"]);
    }

    #[tokio::test]
    async fn concurrent_tools_share_one_record() {
        let features = Arc::new(StubFeatureSource::new(vec![feature(
            51,
            "Plovdiv",
            LocationType::City,
            Coordinates::new(42.14, 24.75),
            &[("place", "city")],
        )]));
        let mcp = server("tool_concurrent", features).await;

        let (generic, cities) = tokio::join!(
            mcp.search_location(Parameters(SearchLocationParams {
                name: "Plovdiv".to_string(),
                location_type: None,
            })),
            mcp.search_cities(Parameters(SearchParams {
                name: "Plovdiv".to_string(),
            })),
        );
        let (generic, cities) = (generic.unwrap(), cities.unwrap());

        assert_ne!(generic.is_error, Some(true));
        assert_ne!(cities.is_error, Some(true));
        assert_eq!(payload(&generic)["id"], payload(&cities)["id"]);
        assert_eq!(mcp.control().store().count(Partition::Cities).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failures_become_error_payloads() {
        let mcp = server("tool_errors", Arc::new(StubFeatureSource::new(Vec::new()))).await;

        let result = mcp
            .search_location(Parameters(SearchLocationParams {
                name: "Atlantis".to_string(),
                location_type: Some("city".to_string()),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(payload(&result)["error"], "no results for Atlantis");

        let result = mcp
            .search_all_peaks(Parameters(SearchParams { name: String::new() }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(payload(&result)["error"], "name required");
    }

    #[test]
    fn type_parameter_uses_wire_name() {
        let params: SearchLocationParams =
            serde_json::from_value(serde_json::json!({"name": "Rila", "type": "monastery"})).unwrap();
        assert_eq!(params.location_type.as_deref(), Some("monastery"));
    }
}
