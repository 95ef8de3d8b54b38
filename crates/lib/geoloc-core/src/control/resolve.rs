use chrono::Utc;
use geoloc_store::{LocationRecord, LocationType, Partition};
use surrealdb::Connection;
use tracing::{debug, info, warn};

use crate::enrich::{Facts, Summary};
use crate::overpass::{FeatureScope, RawFeature, search_scoped};
use crate::router::{partition_for, partition_for_type};
use crate::services::ResolutionLocks;
use crate::validate::validate;

use super::{ControlError, LocationControlPlane, merge_location};

/// Coordinates closer than this in both axes are the same place (~100 m).
pub const DEDUP_TOLERANCE_DEG: f64 = 0.001;

/// Where a resolution looks in the cache and how it queries the feature source.
#[derive(Debug, Clone, PartialEq)]
struct Target {
    location_type: Option<String>,
    partitions: Vec<Partition>,
    scope: FeatureScope,
}

impl Target {
    fn new(location_type: Option<&str>, category: Option<&str>) -> Self {
        let location_type = non_blank(location_type);
        let category = non_blank(category);

        if let Some(kind) = location_type {
            let scope = kind
                .parse::<LocationType>()
                .map_or(FeatureScope::Combined, FeatureScope::Type);
            return Self {
                location_type: Some(kind.to_string()),
                partitions: vec![partition_for(kind)],
                scope,
            };
        }

        let Some(category) = category else {
            return Self {
                location_type: None,
                partitions: Partition::ALL.to_vec(),
                scope: FeatureScope::Progressive,
            };
        };

        let scope = FeatureScope::from_category(Some(category));
        let partitions = match scope {
            FeatureScope::Partition(partition) => vec![partition],
            FeatureScope::Type(kind) => vec![partition_for_type(kind)],
            FeatureScope::Combined | FeatureScope::Progressive => Partition::ALL.to_vec(),
        };
        Self {
            location_type: None,
            partitions,
            scope,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn normalize_name(name: &str) -> Result<&str, ControlError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ControlError::Input("name required".to_string()));
    }
    Ok(name)
}

fn no_results(name: &str) -> ControlError {
    ControlError::NotFound(format!("no results for {name}"))
}

/// Drops features within [`DEDUP_TOLERANCE_DEG`] of an earlier one.
#[must_use]
pub fn dedup_features(features: Vec<RawFeature>) -> Vec<RawFeature> {
    let mut kept: Vec<RawFeature> = Vec::with_capacity(features.len());
    for feature in features {
        if kept
            .iter()
            .any(|seen| seen.is_near(&feature, DEDUP_TOLERANCE_DEG))
        {
            debug!(name = %feature.name, osm_id = feature.osm_id, "skipping duplicate feature");
            continue;
        }
        kept.push(feature);
    }
    kept
}

impl<C: Connection> LocationControlPlane<C> {
    /// Resolves the single best match for `name`, serving from the cache when
    /// an exact-name entry exists.
    ///
    /// # Errors
    /// Returns `ControlError::Input` for a blank name, `NotFound` when nothing
    /// matches, `Upstream` when the feature source fails, `Validation` when the
    /// merged record is rejected, and `Store` for database failures.
    pub async fn resolve_one(
        &self,
        name: &str,
        location_type: Option<&str>,
        category: Option<&str>,
    ) -> Result<LocationRecord, ControlError> {
        let name = normalize_name(name)?;
        let target = Target::new(location_type, category);

        if let Some(hit) = self.cached(name, &target, Some(1)).await?.into_iter().next() {
            debug!(name, id = ?hit.id, "cache hit");
            return Ok(hit);
        }

        let result = self.resolve_one_locked(name, &target).await;
        self.locks.prune().await;
        result
    }

    async fn resolve_one_locked(
        &self,
        name: &str,
        target: &Target,
    ) -> Result<LocationRecord, ControlError> {
        let _guard = self
            .locks
            .acquire(&ResolutionLocks::key(name))
            .await;
        if let Some(hit) = self.cached(name, target, Some(1)).await?.into_iter().next() {
            debug!(name, id = ?hit.id, "cache filled while waiting");
            return Ok(hit);
        }

        let features = search_scoped(self.features.as_ref(), name, target.scope).await?;
        let Some(feature) = features.into_iter().next() else {
            return Err(no_results(name));
        };
        if let Some(stored) = self.stored_feature(&feature).await? {
            debug!(name, id = ?stored.id, "feature already stored");
            return Ok(stored);
        }

        let record = self.enrich(feature).await;
        let report = validate(&record);
        if !report.valid {
            return Err(ControlError::Validation {
                errors: report.errors,
            });
        }

        let stored = self.store.insert(record.partition, record).await?;
        info!(
            name = %stored.name,
            partition = %stored.partition,
            id = ?stored.id,
            "location resolved"
        );
        Ok(stored)
    }

    /// Resolves every match for `name`. Any cached match short-circuits the
    /// external query entirely.
    ///
    /// # Errors
    /// Same as [`Self::resolve_one`], except that a candidate failing
    /// validation is skipped rather than failing the call.
    pub async fn resolve_all(
        &self,
        name: &str,
        location_type: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<LocationRecord>, ControlError> {
        let name = normalize_name(name)?;
        let target = Target::new(location_type, category);

        let cached = self.cached(name, &target, None).await?;
        if !cached.is_empty() {
            debug!(name, count = cached.len(), "cache hit");
            return Ok(cached);
        }

        let result = self.resolve_all_locked(name, &target).await;
        self.locks.prune().await;
        result
    }

    async fn resolve_all_locked(
        &self,
        name: &str,
        target: &Target,
    ) -> Result<Vec<LocationRecord>, ControlError> {
        let _guard = self
            .locks
            .acquire(&ResolutionLocks::key(name))
            .await;
        let cached = self.cached(name, target, None).await?;
        if !cached.is_empty() {
            return Ok(cached);
        }

        let features = search_scoped(self.features.as_ref(), name, target.scope).await?;
        let features = dedup_features(features);

        let mut stored = Vec::with_capacity(features.len());
        for feature in features {
            if let Some(existing) = self.stored_feature(&feature).await? {
                stored.push(existing);
                continue;
            }
            let record = self.enrich(feature).await;
            let report = validate(&record);
            if !report.valid {
                warn!(
                    name = %record.name,
                    osm_id = ?record.osm_id,
                    errors = %report.joined(),
                    "skipping invalid location"
                );
                continue;
            }
            stored.push(self.store.insert(record.partition, record).await?);
        }

        if stored.is_empty() {
            return Err(no_results(name));
        }
        info!(name, count = stored.len(), "locations resolved");
        Ok(stored)
    }

    async fn cached(
        &self,
        name: &str,
        target: &Target,
        limit: Option<usize>,
    ) -> Result<Vec<LocationRecord>, ControlError> {
        let mut hits = Vec::new();
        for partition in &target.partitions {
            let found = self
                .store
                .find_by_name(*partition, name, target.location_type.as_deref(), limit)
                .await?;
            hits.extend(found);
            if let Some(limit) = limit
                && hits.len() >= limit
            {
                hits.truncate(limit);
                break;
            }
        }
        Ok(hits)
    }

    /// Row already stored for this OSM element, looked up in the partition its
    /// resolved type routes to. A requested type can differ from the type the
    /// tags resolve to, so the name cache alone can miss it.
    async fn stored_feature(
        &self,
        feature: &RawFeature,
    ) -> Result<Option<LocationRecord>, ControlError> {
        Ok(self
            .store
            .find_by_osm(
                partition_for_type(feature.kind),
                &feature.osm_type,
                feature.osm_id,
            )
            .await?)
    }

    /// Fetches both enrichments concurrently and merges them into a record.
    async fn enrich(&self, feature: RawFeature) -> LocationRecord {
        let narrative = async {
            let tag = feature.wikipedia_tag()?;
            match self.narrative.summary(tag).await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(tag, error = %err, "narrative enrichment failed");
                    None
                }
            }
        };
        let facts = async {
            let id = feature.wikidata_id()?;
            match self.facts.facts(id).await {
                Ok(facts) => facts,
                Err(err) => {
                    warn!(id, error = %err, "facts enrichment failed");
                    None
                }
            }
        };
        let (summary, facts): (Option<Summary>, Option<Facts>) = tokio::join!(narrative, facts);
        merge_location(feature, summary.as_ref(), facts.as_ref(), Utc::now())
    }
}
