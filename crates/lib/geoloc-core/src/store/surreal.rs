use std::{error::Error, fmt, sync::Arc};

use geoloc_store::{LocationDocument, LocationRecord, Partition, Provenance};
use surrealdb::{Connection, Surreal};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
pub enum StoreError {
    Surreal(Box<surrealdb::Error>),
    InvalidInput(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surreal(err) => write!(f, "SurrealDB error: {err}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Surreal(err) => Some(err.as_ref()),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Surreal(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Location cache backed by one `SurrealDB` table per partition.
pub struct SurrealLocationStore<C: Connection> {
    db: Arc<Surreal<C>>,
}

impl<C: Connection> Clone for SurrealLocationStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealLocationStore<C> {
    #[must_use]
    pub fn new(db: Surreal<C>) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Exact-name lookup within a partition, optionally narrowed by type.
    ///
    /// # Errors
    /// Returns `StoreError` if the name or limit is invalid or the query fails.
    pub async fn find_by_name(
        &self,
        partition: Partition,
        name: &str,
        location_type: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<LocationRecord>> {
        ensure_non_empty(name, "name")?;
        let name = name.to_string();
        let mut query = String::from("SELECT * FROM type::table($table) WHERE name = $name");
        if location_type.is_some() {
            query.push_str(" AND location_type = $location_type");
        }
        query.push_str(" ORDER BY name ASC");
        if limit.is_some() {
            query.push_str(" LIMIT $limit");
        }
        query.push(';');

        let mut request = self
            .db
            .query(query)
            .bind(("table", partition.table()))
            .bind(("name", name));
        if let Some(location_type) = location_type {
            request = request.bind(("location_type", location_type.to_string()));
        }
        if let Some(limit) = limit {
            request = request.bind(("limit", limit_to_i64(limit)?));
        }
        let mut response = request.await?;
        let rows: Vec<LocationDocument> = response.take(0)?;
        Ok(into_records(rows, partition))
    }

    /// Stores a location once per OSM element.
    ///
    /// The key is derived from the OSM identity when the record carries one,
    /// so writing the same element again returns the stored row (with
    /// `Provenance::Cache`) instead of adding a duplicate. Records without an
    /// OSM identity get a random key.
    ///
    /// # Errors
    /// Returns `StoreError` if the write fails or returns no row.
    pub async fn insert(
        &self,
        partition: Partition,
        record: LocationRecord,
    ) -> StoreResult<LocationRecord> {
        ensure_non_empty(&record.name, "name")?;
        let key = match (record.osm_type.as_deref(), record.osm_id) {
            (Some(osm_type), Some(osm_id)) if !osm_type.trim().is_empty() => {
                osm_record_key(osm_type, osm_id)
            }
            _ => Uuid::new_v4().to_string(),
        };
        if let Some(existing) = self.get(partition, &key).await? {
            debug!(table = partition.table(), %key, "location already stored");
            return Ok(existing);
        }

        let document = record.into_document(key.clone());
        let created: Result<Option<LocationDocument>, surrealdb::Error> = self
            .db
            .create((partition.table(), key.as_str()))
            .content(document)
            .await;
        let created = match created {
            Ok(created) => require_record(created, partition.table())?,
            // Another writer created the same element between the read and
            // the create.
            Err(err) => {
                return match self.get(partition, &key).await? {
                    Some(existing) => Ok(existing),
                    None => Err(err.into()),
                };
            }
        };
        debug!(table = partition.table(), key = %created.key, "location stored");
        Ok(created.into_record(partition, Provenance::FreshlyResolved))
    }

    /// Fetches the row stored for an OSM element, if any.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn find_by_osm(
        &self,
        partition: Partition,
        osm_type: &str,
        osm_id: i64,
    ) -> StoreResult<Option<LocationRecord>> {
        self.get(partition, &osm_record_key(osm_type, osm_id)).await
    }

    /// Fetches one location by key; a `table:` prefix on the id is ignored.
    ///
    /// # Errors
    /// Returns `StoreError` if the id is empty or the query fails.
    pub async fn get(&self, partition: Partition, id: &str) -> StoreResult<Option<LocationRecord>> {
        let key = record_key(id);
        ensure_non_empty(key, "id")?;
        let row: Option<LocationDocument> = self.db.select((partition.table(), key)).await?;
        Ok(row.map(|row| row.into_record(partition, Provenance::Cache)))
    }

    /// Lists a partition ordered by name.
    ///
    /// # Errors
    /// Returns `StoreError` if the limit is invalid or the query fails.
    pub async fn list(
        &self,
        partition: Partition,
        location_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<LocationRecord>> {
        let limit = limit_to_i64(limit)?;
        let response = if let Some(location_type) = location_type {
            let query = "SELECT * FROM type::table($table) WHERE location_type = $location_type ORDER BY name ASC LIMIT $limit;";
            self.db
                .query(query)
                .bind(("table", partition.table()))
                .bind(("location_type", location_type.to_string()))
                .bind(("limit", limit))
                .await
        } else {
            let query = "SELECT * FROM type::table($table) ORDER BY name ASC LIMIT $limit;";
            self.db
                .query(query)
                .bind(("table", partition.table()))
                .bind(("limit", limit))
                .await
        };
        let rows: Vec<LocationDocument> = response?.take(0)?;
        Ok(into_records(rows, partition))
    }

    /// Number of rows in a partition.
    ///
    /// # Errors
    /// Returns `StoreError` if the query fails.
    pub async fn count(&self, partition: Partition) -> StoreResult<u64> {
        let query = "SELECT count() AS count FROM type::table($table) GROUP ALL;";
        let mut response = self
            .db
            .query(query)
            .bind(("table", partition.table()))
            .await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows
            .first()
            .map_or(0, |row| u64::try_from(row.count).unwrap_or(0)))
    }

    /// Queries every partition once; used at startup to fail fast when the
    /// database is unreachable.
    ///
    /// # Errors
    /// Returns the first `StoreError` encountered.
    pub async fn probe(&self) -> StoreResult<Vec<(Partition, u64)>> {
        let mut counts = Vec::with_capacity(Partition::ALL.len());
        for partition in Partition::ALL {
            counts.push((partition, self.count(partition).await?));
        }
        Ok(counts)
    }
}

#[derive(serde::Deserialize)]
struct CountRow {
    count: i64,
}

fn into_records(rows: Vec<LocationDocument>, partition: Partition) -> Vec<LocationRecord> {
    rows.into_iter()
        .map(|row| row.into_record(partition, Provenance::Cache))
        .collect()
}

/// Store key for an OSM element, e.g. `node_123`.
fn osm_record_key(osm_type: &str, osm_id: i64) -> String {
    format!("{}_{osm_id}", osm_type.trim().to_lowercase())
}

fn record_key(id: &str) -> &str {
    let id = id.trim();
    let key = id.split_once(':').map_or(id, |(_, key)| key);
    key.trim_start_matches('⟨').trim_end_matches('⟩')
}

fn ensure_non_empty(value: &str, field: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn require_record<T>(record: Option<T>, table: &str) -> StoreResult<T> {
    record.ok_or_else(|| {
        StoreError::InvalidInput(format!("No record returned when creating {table}"))
    })
}

fn limit_to_i64(limit: usize) -> StoreResult<i64> {
    i64::try_from(limit)
        .map_err(|_| StoreError::InvalidInput("limit exceeds supported range".to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geoloc_store::{Coordinates, CrossReferenceIds};
    use surrealdb::engine::local::{Db, Mem};

    use super::*;

    async fn store() -> SurrealLocationStore<Db> {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("geoloc").use_db("test").await.unwrap();
        SurrealLocationStore::new(db)
    }

    fn record(name: &str, kind: &str, partition: Partition, osm_id: i64) -> LocationRecord {
        LocationRecord {
            id: None,
            name: name.to_string(),
            location_type: kind.to_string(),
            coordinates: Some(Coordinates::new(42.1, 23.3)),
            osm_id: Some(osm_id),
            osm_type: Some("node".to_string()),
            tags: BTreeMap::new(),
            description: None,
            wikipedia_url: None,
            wikipedia_lang: None,
            population: None,
            elevation: None,
            area: None,
            website: None,
            images: Vec::new(),
            cross_reference_ids: CrossReferenceIds::default(),
            last_updated: "2024-01-01T00:00:00Z".to_string(),
            provenance: Provenance::FreshlyResolved,
            partition,
        }
    }

    #[test]
    fn record_key_strips_table_prefix() {
        assert_eq!(record_key("cities:abc"), "abc");
        assert_eq!(record_key("cities:⟨a-b⟩"), "a-b");
        assert_eq!(record_key(" abc "), "abc");
    }

    #[tokio::test]
    async fn insert_then_find_and_get() {
        let store = store().await;
        let stored = store
            .insert(Partition::Cities, record("Plovdiv", "city", Partition::Cities, 1))
            .await
            .unwrap();
        let id = stored.id.clone().unwrap();
        assert_eq!(stored.provenance, Provenance::FreshlyResolved);

        let found = store
            .find_by_name(Partition::Cities, "Plovdiv", Some("city"), Some(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_deref(), Some(id.as_str()));
        assert_eq!(found[0].provenance, Provenance::Cache);

        let wrong_type = store
            .find_by_name(Partition::Cities, "Plovdiv", Some("village"), None)
            .await
            .unwrap();
        assert!(wrong_type.is_empty());

        let fetched = store
            .get(Partition::Cities, &format!("cities:{id}"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "Plovdiv");
        assert!(store.get(Partition::Peaks, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_osm_element_is_stored_once() {
        let store = store().await;
        let first = store
            .insert(Partition::CulturalSites, record("Tsarevets", "attraction", Partition::CulturalSites, 42))
            .await
            .unwrap();
        assert_eq!(first.id.as_deref(), Some("node_42"));
        assert_eq!(first.provenance, Provenance::FreshlyResolved);

        let again = store
            .insert(Partition::CulturalSites, record("Tsarevets", "attraction", Partition::CulturalSites, 42))
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.provenance, Provenance::Cache);
        assert_eq!(store.count(Partition::CulturalSites).await.unwrap(), 1);

        let found = store
            .find_by_osm(Partition::CulturalSites, "node", 42)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Tsarevets");
        assert!(
            store
                .find_by_osm(Partition::Cities, "node", 42)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn records_without_osm_identity_get_random_keys() {
        let store = store().await;
        let mut anonymous = record("Vitosha", "mountain_range", Partition::Mountains, 0);
        anonymous.osm_id = None;

        let first = store.insert(Partition::Mountains, anonymous.clone()).await.unwrap();
        let second = store.insert(Partition::Mountains, anonymous).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.count(Partition::Mountains).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_orders_by_name_and_filters_type() {
        let store = store().await;
        for (osm_id, name, kind) in [(1, "Varna", "city"), (2, "Bansko", "town"), (3, "Ruse", "city")] {
            store
                .insert(Partition::Cities, record(name, kind, Partition::Cities, osm_id))
                .await
                .unwrap();
        }

        let all = store.list(Partition::Cities, None, 50).await.unwrap();
        let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Bansko", "Ruse", "Varna"]);

        let cities = store.list(Partition::Cities, Some("city"), 1).await.unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].name, "Ruse");

        let counts = store.probe().await.unwrap();
        assert_eq!(counts[0], (Partition::Cities, 3));
        assert_eq!(counts[1], (Partition::Mountains, 0));
    }
}
