//! Category router between location types and storage partitions.

use geoloc_store::{LocationType, Partition, UnknownVariant};

/// Partition a location type is stored in.
#[must_use]
pub const fn partition_for_type(kind: LocationType) -> Partition {
    match kind {
        LocationType::City
        | LocationType::Town
        | LocationType::Village
        | LocationType::Hamlet
        | LocationType::Suburb
        | LocationType::Neighbourhood
        | LocationType::Quarter
        | LocationType::Locality
        | LocationType::IsolatedDwelling
        | LocationType::Municipality
        | LocationType::Region => Partition::Cities,
        LocationType::MountainRange => Partition::Mountains,
        LocationType::Peak => Partition::Peaks,
        LocationType::Cave
        | LocationType::Waterfall
        | LocationType::Island
        | LocationType::Islet
        | LocationType::AlpineHut
        | LocationType::Viewpoint => Partition::NaturalSites,
        LocationType::Museum
        | LocationType::Attraction
        | LocationType::Castle
        | LocationType::Fort
        | LocationType::Ruins
        | LocationType::ArchaeologicalSite
        | LocationType::Monastery
        | LocationType::Memorial
        | LocationType::Church
        | LocationType::HistoricalSite
        | LocationType::PlaceOfWorship
        | LocationType::Unknown => Partition::CulturalSites,
    }
}

/// Partition for a free-form type name; unrecognised names go to
/// `cultural_sites`.
#[must_use]
pub fn partition_for(kind: &str) -> Partition {
    kind.parse::<LocationType>()
        .map_or(Partition::CulturalSites, partition_for_type)
}

/// Parses an optional collection argument; blank input means no partition.
///
/// # Errors
/// Returns `UnknownVariant` when the value names no partition.
pub fn parse_partition(value: Option<&str>) -> Result<Option<Partition>, UnknownVariant> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

/// Location types expected in a partition.
#[must_use]
pub fn types_for(partition: Partition) -> Vec<LocationType> {
    LocationType::ALL
        .iter()
        .copied()
        .filter(|kind| partition_for_type(*kind) == partition)
        .collect()
}
