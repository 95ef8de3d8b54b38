use std::sync::Arc;

use surrealdb::Connection;
use thiserror::Error;

use crate::enrich::{FactsSource, NarrativeSource};
use crate::overpass::{FeatureSource, SearchError};
use crate::services::ResolutionLocks;
use crate::store::{StoreError, SurrealLocationStore};
use crate::upstream::UpstreamError;
use crate::validate::FieldError;

pub mod data;
pub mod merge;
pub mod resolve;

pub use data::DEFAULT_LIST_LIMIT;
pub use merge::merge_location;

#[derive(Debug, Error)]
pub enum ControlError {
    /// Caller-correctable input problem.
    #[error("{0}")]
    Input(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("validation failed: {}", join_field_errors(.errors))]
    Validation { errors: Vec<FieldError> },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SearchError> for ControlError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotFound { .. } => Self::NotFound(err.to_string()),
            SearchError::Upstream(err) => Self::Upstream(err),
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolution pipeline and store reads behind the tool surface.
pub struct LocationControlPlane<C: Connection> {
    store: SurrealLocationStore<C>,
    features: Arc<dyn FeatureSource>,
    narrative: Arc<dyn NarrativeSource>,
    facts: Arc<dyn FactsSource>,
    locks: ResolutionLocks,
}

impl<C: Connection> Clone for LocationControlPlane<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            features: self.features.clone(),
            narrative: self.narrative.clone(),
            facts: self.facts.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<C: Connection> LocationControlPlane<C> {
    pub fn new(
        store: SurrealLocationStore<C>,
        features: Arc<dyn FeatureSource>,
        narrative: Arc<dyn NarrativeSource>,
        facts: Arc<dyn FactsSource>,
    ) -> Self {
        Self {
            store,
            features,
            narrative,
            facts,
            locks: ResolutionLocks::new(),
        }
    }

    pub const fn store(&self) -> &SurrealLocationStore<C> {
        &self.store
    }

    pub const fn locks(&self) -> &ResolutionLocks {
        &self.locks
    }
}
