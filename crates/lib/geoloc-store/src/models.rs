use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::Partition;

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// External identifiers used for enrichment, kept for provenance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrossReferenceIds {
    /// Wikipedia page tag in `lang:title` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia: Option<String>,
    /// Wikidata entity id (`Q…`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata: Option<String>,
}

/// Whether a record was served from the store or resolved during this call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Cache,
    FreshlyResolved,
}

/// Canonical enriched location returned by the resolution pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub location_type: String,
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osm_type: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikipedia_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikipedia_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub cross_reference_ids: CrossReferenceIds,
    pub last_updated: String,
    pub provenance: Provenance,
    pub partition: Partition,
}

impl LocationRecord {
    /// Converts the record into its persisted form under the given store key.
    #[must_use]
    pub fn into_document(self, key: String) -> LocationDocument {
        LocationDocument {
            key,
            name: self.name,
            location_type: self.location_type,
            coordinates: self.coordinates,
            osm_id: self.osm_id,
            osm_type: self.osm_type,
            tags: self.tags,
            description: self.description,
            wikipedia_url: self.wikipedia_url,
            wikipedia_lang: self.wikipedia_lang,
            population: self.population,
            elevation: self.elevation,
            area: self.area,
            website: self.website,
            images: self.images,
            cross_reference_ids: self.cross_reference_ids,
            last_updated: self.last_updated,
        }
    }
}

/// Row shape stored in a partition table.
///
/// The record id assigned by `SurrealDB` is not deserialized; `key` mirrors it
/// so callers can address the row by a plain string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationDocument {
    pub key: String,
    pub name: String,
    pub location_type: String,
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_type: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub cross_reference_ids: CrossReferenceIds,
    pub last_updated: String,
}

impl LocationDocument {
    /// Rebuilds the domain record for a row read from `partition`.
    #[must_use]
    pub fn into_record(self, partition: Partition, provenance: Provenance) -> LocationRecord {
        LocationRecord {
            id: Some(self.key),
            name: self.name,
            location_type: self.location_type,
            coordinates: self.coordinates,
            osm_id: self.osm_id,
            osm_type: self.osm_type,
            tags: self.tags,
            description: self.description,
            wikipedia_url: self.wikipedia_url,
            wikipedia_lang: self.wikipedia_lang,
            population: self.population,
            elevation: self.elevation,
            area: self.area,
            website: self.website,
            images: self.images,
            cross_reference_ids: self.cross_reference_ids,
            last_updated: self.last_updated,
            provenance,
            partition,
        }
    }
}
