//! Field precedence for assembling a record from a feature and its enrichment.
//!
//! | field                       | first choice | fallback          |
//! |-----------------------------|--------------|-------------------|
//! | description                 | narrative    | facts             |
//! | `wikipedia_url` / `_lang`   | narrative    | none              |
//! | population, area, website   | facts        | none              |
//! | elevation                   | facts        | `ele` tag         |
//! | images                      | narrative    | then facts, union |
//! | coordinates                 | feature      | none              |

use chrono::{DateTime, SecondsFormat, Utc};
use geoloc_store::{CrossReferenceIds, LocationRecord, Provenance};

use crate::enrich::{Facts, Summary};
use crate::overpass::RawFeature;
use crate::router::partition_for_type;

/// Builds the candidate record for a freshly resolved feature.
#[must_use]
pub fn merge_location(
    feature: RawFeature,
    summary: Option<&Summary>,
    facts: Option<&Facts>,
    now: DateTime<Utc>,
) -> LocationRecord {
    let cross_reference_ids = CrossReferenceIds {
        wikipedia: feature.wikipedia_tag().map(str::to_string),
        wikidata: feature.wikidata_id().map(str::to_string),
    };

    let description = summary
        .and_then(|summary| summary.extract.clone())
        .or_else(|| facts.and_then(|facts| facts.description.clone()))
        .filter(|text| !text.trim().is_empty());
    let elevation = facts
        .and_then(|facts| facts.elevation)
        .or_else(|| feature.tags.get("ele").and_then(|ele| parse_elevation(ele)));

    let narrative_image = summary.and_then(Summary::primary_image);
    let fact_images = facts.map(|facts| facts.images.as_slice()).unwrap_or_default();
    let images = union_images(narrative_image.into_iter().chain(fact_images.iter().map(String::as_str)));

    LocationRecord {
        id: None,
        name: feature.name,
        location_type: feature.kind.to_string(),
        coordinates: Some(feature.coordinates),
        osm_id: Some(feature.osm_id),
        osm_type: Some(feature.osm_type),
        description,
        wikipedia_url: summary.and_then(|summary| summary.url.clone()),
        wikipedia_lang: summary.and_then(|summary| summary.lang.clone()),
        population: facts.and_then(|facts| facts.population),
        elevation,
        area: facts.and_then(|facts| facts.area),
        website: facts.and_then(|facts| facts.website.clone()),
        images,
        cross_reference_ids,
        last_updated: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        provenance: Provenance::FreshlyResolved,
        partition: partition_for_type(feature.kind),
        tags: feature.tags,
    }
}

fn union_images<'a>(candidates: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();
    for image in candidates.map(str::trim).filter(|image| !image.is_empty()) {
        if !images.iter().any(|seen| seen == image) {
            images.push(image.to_string());
        }
    }
    images
}

/// Parses an OSM `ele` value such as `2925`, `2925 m` or `2925,4`.
fn parse_elevation(raw: &str) -> Option<f64> {
    let value = raw.trim();
    let value = value
        .strip_suffix('m')
        .map_or(value, str::trim_end)
        .replace(',', ".");
    value.parse::<f64>().ok().filter(|value| value.is_finite())
}
