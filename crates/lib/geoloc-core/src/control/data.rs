use geoloc_store::{LocationRecord, Partition};
use surrealdb::Connection;

use crate::router::{parse_partition, partition_for};

use super::{ControlError, LocationControlPlane};

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 1000;

fn collection(value: Option<&str>) -> Result<Option<Partition>, ControlError> {
    parse_partition(value).map_err(|err| ControlError::Input(err.to_string()))
}

impl<C: Connection> LocationControlPlane<C> {
    /// Fetches a location by id from one collection, or probes every
    /// collection in order when none is given.
    ///
    /// # Errors
    /// Returns `ControlError::Input` for a blank id or unknown collection,
    /// `NotFound` when no collection holds the id, and `Store` on query failure.
    pub async fn get_location_by_id(
        &self,
        id: &str,
        collection_name: Option<&str>,
    ) -> Result<LocationRecord, ControlError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ControlError::Input("id required".to_string()));
        }

        // A `table:key` id names its own collection.
        let prefixed = id
            .split_once(':')
            .and_then(|(table, _)| table.parse::<Partition>().ok());
        let partitions = match (collection(collection_name)?, prefixed) {
            (Some(partition), _) | (None, Some(partition)) => vec![partition],
            (None, None) => Partition::ALL.to_vec(),
        };

        for partition in partitions {
            if let Some(record) = self.store.get(partition, id).await? {
                return Ok(record);
            }
        }
        Err(ControlError::NotFound(format!("no location with id {id}")))
    }

    /// Lists stored locations ordered by name.
    ///
    /// Without a collection the type's partition is used; with neither, every
    /// collection is listed and merged by name.
    ///
    /// # Errors
    /// Returns `ControlError::Input` for an unknown collection and `Store` on
    /// query failure.
    pub async fn list_locations(
        &self,
        collection_name: Option<&str>,
        location_type: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<LocationRecord>, ControlError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let location_type = location_type
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let partitions = match (collection(collection_name)?, location_type) {
            (Some(partition), _) => vec![partition],
            (None, Some(kind)) => vec![partition_for(kind)],
            (None, None) => Partition::ALL.to_vec(),
        };

        let mut records = Vec::new();
        for partition in partitions {
            records.extend(self.store.list(partition, location_type, limit).await?);
        }
        records.sort_by(|left, right| left.name.cmp(&right.name));
        records.truncate(limit);
        Ok(records)
    }

    /// Row counts per collection.
    ///
    /// # Errors
    /// Returns `ControlError::Store` on query failure.
    pub async fn collection_counts(&self) -> Result<Vec<(Partition, u64)>, ControlError> {
        Ok(self.store.probe().await?)
    }
}
