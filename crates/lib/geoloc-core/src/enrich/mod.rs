//! Encyclopedic enrichment sources.
//!
//! Both sources return `Ok(None)` for identifiers they cannot use; the
//! orchestrator additionally absorbs their errors so a degraded source never
//! aborts a resolution.

pub mod retry;
pub mod wikidata;
pub mod wikipedia;

use async_trait::async_trait;
use geoloc_store::Coordinates;

use crate::upstream::UpstreamError;

pub use retry::RetryPolicy;
pub use wikidata::{WikidataClient, WikidataConfig};
pub use wikipedia::{WikipediaClient, WikipediaConfig};

/// Narrative page summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub title: Option<String>,
    pub extract: Option<String>,
    pub url: Option<String>,
    pub lang: Option<String>,
    pub thumbnail: Option<String>,
    pub original_image: Option<String>,
}

impl Summary {
    /// Primary image: the original if present, else the thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.original_image
            .as_deref()
            .or(self.thumbnail.as_deref())
    }
}

/// Structured facts for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts {
    pub id: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub population: Option<f64>,
    pub elevation: Option<f64>,
    pub area: Option<f64>,
    pub website: Option<String>,
    pub images: Vec<String>,
    pub coordinates: Option<Coordinates>,
}

/// Source of narrative summaries keyed by a `lang:title` tag.
#[async_trait]
pub trait NarrativeSource: Send + Sync {
    async fn summary(&self, tag: &str) -> Result<Option<Summary>, UpstreamError>;
}

/// Source of structured facts keyed by an entity id.
#[async_trait]
pub trait FactsSource: Send + Sync {
    async fn facts(&self, id: &str) -> Result<Option<Facts>, UpstreamError>;
}
