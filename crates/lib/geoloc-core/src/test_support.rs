//! Test doubles for the pipeline's external collaborators.
//!
//! Available to unit tests and, behind the `test-support` feature, to other
//! crates' tests. Every stub counts its calls so tests can assert that a cache
//! hit never reaches an external source.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use geoloc_store::{Coordinates, LocationType};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

use crate::control::LocationControlPlane;
use crate::enrich::{Facts, FactsSource, NarrativeSource, Summary};
use crate::overpass::{FeatureSource, RawFeature, TagSelector};
use crate::store::SurrealLocationStore;
use crate::upstream::UpstreamError;

/// Builds a feature with the given tags.
#[must_use]
pub fn feature(
    osm_id: i64,
    name: &str,
    kind: LocationType,
    coordinates: Coordinates,
    tags: &[(&str, &str)],
) -> RawFeature {
    RawFeature {
        osm_id,
        osm_type: "node".to_string(),
        name: name.to_string(),
        coordinates,
        kind,
        tags: tags
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Feature source returning a fixed list.
pub struct StubFeatureSource {
    features: Vec<RawFeature>,
    only_for_key: Option<&'static str>,
    error: Option<UpstreamError>,
    calls: AtomicUsize,
    queried_keys: Mutex<Vec<&'static str>>,
}

impl StubFeatureSource {
    #[must_use]
    pub fn new(features: Vec<RawFeature>) -> Self {
        Self {
            features,
            only_for_key: None,
            error: None,
            calls: AtomicUsize::new(0),
            queried_keys: Mutex::new(Vec::new()),
        }
    }

    /// Answers only queries whose first selector uses `key`; others get
    /// nothing.
    #[must_use]
    pub const fn only_for_key(mut self, key: &'static str) -> Self {
        self.only_for_key = Some(key);
        self
    }

    /// Fails every query with `error`.
    #[must_use]
    pub fn failing(error: UpstreamError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// First selector key of every query, in call order.
    #[must_use]
    pub fn queried_keys(&self) -> Vec<&'static str> {
        self.queried_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FeatureSource for StubFeatureSource {
    async fn search(
        &self,
        _term: &str,
        selectors: &[TagSelector],
    ) -> Result<Vec<RawFeature>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = selectors.first().map_or("", |selector| selector.key);
        self.queried_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key);

        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        match self.only_for_key {
            Some(only) if only != key => Ok(Vec::new()),
            _ => Ok(self.features.clone()),
        }
    }
}

/// Narrative source returning the same summary for every tag.
pub struct StubNarrativeSource {
    summary: Option<Summary>,
    error: Option<UpstreamError>,
    calls: AtomicUsize,
}

impl StubNarrativeSource {
    #[must_use]
    pub const fn new(summary: Option<Summary>) -> Self {
        Self {
            summary,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn failing(error: UpstreamError) -> Self {
        Self {
            summary: None,
            error: Some(error),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NarrativeSource for StubNarrativeSource {
    async fn summary(&self, _tag: &str) -> Result<Option<Summary>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.summary.clone()),
        }
    }
}

/// Facts source returning the same facts for every id.
pub struct StubFactsSource {
    facts: Option<Facts>,
    error: Option<UpstreamError>,
    calls: AtomicUsize,
}

impl StubFactsSource {
    #[must_use]
    pub const fn new(facts: Option<Facts>) -> Self {
        Self {
            facts,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn failing(error: UpstreamError) -> Self {
        Self {
            facts: None,
            error: Some(error),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactsSource for StubFactsSource {
    async fn facts(&self, _id: &str) -> Result<Option<Facts>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.facts.clone()),
        }
    }
}

/// Fresh in-memory database selected to `geoloc/<db_name>`.
///
/// # Panics
/// Panics if the in-memory engine cannot be started.
pub async fn memory_store(db_name: &str) -> SurrealLocationStore<Db> {
    let db = Surreal::new::<Mem>(())
        .await
        .unwrap_or_else(|err| panic!("failed to create in-memory surrealdb: {err}"));
    db.use_ns("geoloc")
        .use_db(db_name)
        .await
        .unwrap_or_else(|err| panic!("failed to select surrealdb namespace/db: {err}"));
    SurrealLocationStore::new(db)
}

/// Control plane over an in-memory store and the given sources.
///
/// # Panics
/// Panics if the in-memory engine cannot be started.
pub async fn memory_control_plane(
    db_name: &str,
    features: Arc<dyn FeatureSource>,
    narrative: Arc<dyn NarrativeSource>,
    facts: Arc<dyn FactsSource>,
) -> LocationControlPlane<Db> {
    LocationControlPlane::new(memory_store(db_name).await, features, narrative, facts)
}
