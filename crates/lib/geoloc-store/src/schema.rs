use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub const TABLE_CITIES: &str = "cities";
pub const TABLE_MOUNTAINS: &str = "mountains";
pub const TABLE_PEAKS: &str = "peaks";
pub const TABLE_NATURAL_SITES: &str = "natural_sites";
pub const TABLE_CULTURAL_SITES: &str = "cultural_sites";

/// Storage partition (one `SurrealDB` table per partition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Cities,
    Mountains,
    Peaks,
    NaturalSites,
    CulturalSites,
}

impl Partition {
    /// Every partition in probe order.
    pub const ALL: [Self; 5] = [
        Self::Cities,
        Self::Mountains,
        Self::Peaks,
        Self::NaturalSites,
        Self::CulturalSites,
    ];

    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Cities => TABLE_CITIES,
            Self::Mountains => TABLE_MOUNTAINS,
            Self::Peaks => TABLE_PEAKS,
            Self::NaturalSites => TABLE_NATURAL_SITES,
            Self::CulturalSites => TABLE_CULTURAL_SITES,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for Partition {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|partition| partition.table() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "collection",
                value: value.to_string(),
            })
    }
}

macro_rules! location_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Closed set of location categories a record may carry.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum LocationType {
            $($variant),+
        }

        impl LocationType {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }
    };
}

location_types! {
    City => "city",
    Town => "town",
    Village => "village",
    Hamlet => "hamlet",
    Suburb => "suburb",
    Neighbourhood => "neighbourhood",
    Quarter => "quarter",
    Locality => "locality",
    IsolatedDwelling => "isolated_dwelling",
    Municipality => "municipality",
    Region => "region",
    MountainRange => "mountain_range",
    Peak => "peak",
    Cave => "cave",
    Waterfall => "waterfall",
    Island => "island",
    Islet => "islet",
    AlpineHut => "alpine_hut",
    Viewpoint => "viewpoint",
    Museum => "museum",
    Attraction => "attraction",
    Castle => "castle",
    Fort => "fort",
    Ruins => "ruins",
    ArchaeologicalSite => "archaeological_site",
    Monastery => "monastery",
    Memorial => "memorial",
    Church => "church",
    HistoricalSite => "historical_site",
    PlaceOfWorship => "place_of_worship",
    Unknown => "unknown",
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "location type",
                value: value.to_string(),
            })
    }
}

/// Returned when a collection or type name is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl Error for UnknownVariant {}
