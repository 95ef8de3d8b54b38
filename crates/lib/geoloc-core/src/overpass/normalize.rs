//! Normalisation of Overpass elements into [`RawFeature`]s.

use std::collections::BTreeMap;

use geoloc_store::{Coordinates, LocationType};
use serde::Deserialize;

/// Top-level Overpass JSON response.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// A node, way or relation as returned with `out center tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

/// Canonical feature produced by the geodata source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    pub osm_id: i64,
    pub osm_type: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub kind: LocationType,
    pub tags: BTreeMap<String, String>,
}

impl RawFeature {
    /// Wikipedia cross-reference in `lang:title` form, if tagged.
    #[must_use]
    pub fn wikipedia_tag(&self) -> Option<&str> {
        non_empty_tag(&self.tags, "wikipedia")
    }

    /// Wikidata entity id, if tagged.
    #[must_use]
    pub fn wikidata_id(&self) -> Option<&str> {
        non_empty_tag(&self.tags, "wikidata")
    }

    /// Whether both coordinates lie within `tolerance` degrees of `other`.
    #[must_use]
    pub fn is_near(&self, other: &Self, tolerance: f64) -> bool {
        (self.coordinates.lat - other.coordinates.lat).abs() < tolerance
            && (self.coordinates.lon - other.coordinates.lon).abs() < tolerance
    }
}

fn non_empty_tag<'a>(tags: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Converts raw elements, silently dropping any without a name or a point.
#[must_use]
pub fn normalize_elements(elements: Vec<OverpassElement>) -> Vec<RawFeature> {
    elements.into_iter().filter_map(normalize_element).collect()
}

fn normalize_element(element: OverpassElement) -> Option<RawFeature> {
    let name = non_empty_tag(&element.tags, "name")?.to_string();
    let coordinates = match (element.lat, element.lon, element.center) {
        (Some(lat), Some(lon), _) => Coordinates::new(lat, lon),
        (_, _, Some(center)) => Coordinates::new(center.lat, center.lon),
        _ => return None,
    };
    let kind = determine_location_type(&element.tags);
    Some(RawFeature {
        osm_id: element.id,
        osm_type: element.element_type,
        name,
        coordinates,
        kind,
        tags: element.tags,
    })
}

/// Derives the location type from OSM tags; the first matching rule wins.
#[must_use]
pub fn determine_location_type(tags: &BTreeMap<String, String>) -> LocationType {
    let tag = |key: &str| tags.get(key).map(String::as_str);

    if let Some(kind) = tag("place").and_then(|value| value.parse::<LocationType>().ok()) {
        return kind;
    }

    match tag("natural") {
        Some("mountain_range") => return LocationType::MountainRange,
        Some("peak") => return LocationType::Peak,
        Some("cave" | "cave_entrance") => return LocationType::Cave,
        Some("waterfall") => return LocationType::Waterfall,
        _ => {}
    }

    if let Some(tourism) = tag("tourism") {
        return match tourism {
            "alpine_hut" => LocationType::AlpineHut,
            "viewpoint" => LocationType::Viewpoint,
            "museum" => LocationType::Museum,
            _ => LocationType::Attraction,
        };
    }

    if let Some(historic) = tag("historic") {
        return match historic {
            "castle" => LocationType::Castle,
            "fort" => LocationType::Fort,
            "ruins" => LocationType::Ruins,
            "archaeological_site" => LocationType::ArchaeologicalSite,
            "monastery" => LocationType::Monastery,
            "memorial" => LocationType::Memorial,
            "church" => LocationType::Church,
            _ => LocationType::HistoricalSite,
        };
    }

    if tag("amenity") == Some("place_of_worship") {
        return if tag("religion") == Some("christian") {
            LocationType::Church
        } else {
            LocationType::PlaceOfWorship
        };
    }

    LocationType::Unknown
}
