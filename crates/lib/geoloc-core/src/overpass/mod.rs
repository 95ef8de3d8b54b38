//! Geo feature source backed by the Overpass API.
//!
//! [`FeatureSource`] is the seam the resolution pipeline depends on;
//! [`OverpassClient`] is the HTTP implementation. Scoping (partition, type,
//! combined, progressive) is resolved here into tag selectors so the source
//! itself only ever runs one query shape.

pub mod normalize;
pub mod query;

use std::time::Duration;

use async_trait::async_trait;
use geoloc_store::{LocationType, Partition};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::upstream::{UpstreamError, build_client};

pub use normalize::{OverpassResponse, RawFeature, determine_location_type, normalize_elements};
pub use query::{
    SearchRegion,
    SearchStage,
    TagSelector,
    build_query,
    combined_selectors,
    escape_search_term,
    selectors_for_partition,
    selectors_for_type,
};

const SERVICE: &str = "overpass";

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 25;

/// A source of named geographic features.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Returns features whose name matches `term` and whose tags match any of
    /// `selectors`, in source order.
    async fn search(
        &self,
        term: &str,
        selectors: &[TagSelector],
    ) -> Result<Vec<RawFeature>, UpstreamError>;
}

/// Feature search failure as seen by the pipeline.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no location found for \"{term}\"")]
    NotFound { term: String },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// How a search is scoped to feature categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureScope {
    Partition(Partition),
    Type(LocationType),
    Combined,
    Progressive,
}

impl FeatureScope {
    /// Resolves a caller-supplied category: partition name first, then
    /// location type; anything else falls back to the combined query.
    #[must_use]
    pub fn from_category(category: Option<&str>) -> Self {
        let Some(category) = category.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::Combined;
        };
        if let Ok(partition) = category.parse::<Partition>() {
            return Self::Partition(partition);
        }
        if let Ok(kind) = category.parse::<LocationType>() {
            return Self::Type(kind);
        }
        Self::Combined
    }
}

/// Runs a search with the given scope against any feature source.
///
/// # Errors
/// Returns `SearchError::Upstream` for scoped queries that fail, and
/// `SearchError::NotFound` when the last progressive stage fails.
pub async fn search_scoped(
    source: &dyn FeatureSource,
    term: &str,
    scope: FeatureScope,
) -> Result<Vec<RawFeature>, SearchError> {
    let features = match scope {
        FeatureScope::Partition(partition) => {
            source.search(term, selectors_for_partition(partition)).await?
        }
        FeatureScope::Type(kind) => match selectors_for_type(kind) {
            Some(selectors) => source.search(term, &selectors).await?,
            None => source.search(term, &combined_selectors()).await?,
        },
        FeatureScope::Combined => source.search(term, &combined_selectors()).await?,
        FeatureScope::Progressive => return progressive_search(source, term).await,
    };
    Ok(features)
}

/// Tries populated places, then natural features, then cultural sites,
/// stopping at the first stage that yields results.
///
/// A failing stage is logged and skipped; a failure in the final stage is
/// reported as `NotFound` for the term.
///
/// # Errors
/// Returns `SearchError::NotFound` when the final stage fails.
pub async fn progressive_search(
    source: &dyn FeatureSource,
    term: &str,
) -> Result<Vec<RawFeature>, SearchError> {
    let stages = SearchStage::ALL;
    for (index, stage) in stages.iter().enumerate() {
        let is_last = index + 1 == stages.len();
        match source.search(term, stage.selectors()).await {
            Ok(features) if !features.is_empty() => {
                debug!(term, stage = stage.label(), count = features.len(), "stage matched");
                return Ok(features);
            }
            Ok(_) => debug!(term, stage = stage.label(), "stage returned no features"),
            Err(err) if is_last => {
                warn!(term, stage = stage.label(), error = %err, "final search stage failed");
                return Err(SearchError::NotFound {
                    term: term.to_string(),
                });
            }
            Err(err) => {
                warn!(term, stage = stage.label(), error = %err, "search stage failed, trying next");
            }
        }
    }
    Ok(Vec::new())
}

/// Configuration for [`OverpassClient`].
#[derive(Debug, Clone)]
pub struct OverpassConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub query_timeout_secs: u64,
    pub region: SearchRegion,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OVERPASS_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            region: SearchRegion::default(),
        }
    }
}

impl OverpassConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: SearchRegion) -> Self {
        self.region = region;
        self
    }
}

/// HTTP client for the Overpass interpreter endpoint.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: Client,
    config: OverpassConfig,
}

impl OverpassClient {
    /// Creates a client with explicit configuration.
    ///
    /// # Errors
    /// Returns `UpstreamError::Client` if the HTTP client fails to build.
    pub fn with_config(config: OverpassConfig) -> Result<Self, UpstreamError> {
        let client = build_client(SERVICE, config.timeout)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl FeatureSource for OverpassClient {
    async fn search(
        &self,
        term: &str,
        selectors: &[TagSelector],
    ) -> Result<Vec<RawFeature>, UpstreamError> {
        let query = build_query(
            term,
            &self.config.region,
            selectors,
            self.config.query_timeout_secs,
        );
        debug!(term, selectors = selectors.len(), "querying overpass");

        let response = self
            .client
            .post(&self.config.base_url)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, &err, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::from_status(SERVICE, status.as_u16()));
        }

        let body: OverpassResponse = response
            .json()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, &err, self.config.timeout))?;
        Ok(normalize_elements(body.elements))
    }
}
