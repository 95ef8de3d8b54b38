//! Overpass QL construction.
//!
//! Category scoping is table driven: every partition, location type and
//! progressive search stage maps to a list of [`TagSelector`]s, and a single
//! builder renders any selector list into one request.

use std::fmt::Write as _;

use geoloc_store::{LocationType, Partition};

/// One OSM tag filter. An empty `values` slice matches any value of `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSelector {
    pub key: &'static str,
    pub values: &'static [&'static str],
}

impl TagSelector {
    #[must_use]
    pub const fn new(key: &'static str, values: &'static [&'static str]) -> Self {
        Self { key, values }
    }

    fn render(&self) -> String {
        match self.values {
            [] => format!("[\"{}\"]", self.key),
            [single] => format!("[\"{}\"=\"{single}\"]", self.key),
            many => format!("[\"{}\"~\"^({})$\"]", self.key, many.join("|")),
        }
    }
}

const PLACE_VALUES: &[&str] = &["city", "town", "village", "hamlet", "suburb"];
const CULTURAL_HISTORIC_VALUES: &[&str] = &[
    "castle",
    "fort",
    "ruins",
    "archaeological_site",
    "monastery",
    "memorial",
    "church",
];

const CITIES: &[TagSelector] = &[TagSelector::new("place", PLACE_VALUES)];
const MOUNTAINS: &[TagSelector] = &[TagSelector::new("natural", &["mountain_range"])];
const PEAKS: &[TagSelector] = &[TagSelector::new("natural", &["peak"])];
const NATURAL_SITES: &[TagSelector] = &[
    TagSelector::new("natural", &["cave_entrance", "waterfall"]),
    TagSelector::new("tourism", &["alpine_hut", "viewpoint"]),
];
const CULTURAL_SITES: &[TagSelector] = &[
    TagSelector::new("historic", CULTURAL_HISTORIC_VALUES),
    TagSelector::new("tourism", &["museum", "attraction"]),
    TagSelector::new("amenity", &["place_of_worship"]),
];
const NATURAL_FEATURES: &[TagSelector] = &[
    TagSelector::new(
        "natural",
        &["mountain_range", "peak", "cave_entrance", "waterfall"],
    ),
    TagSelector::new("tourism", &["alpine_hut", "viewpoint"]),
];

/// Selectors covering one storage partition.
#[must_use]
pub const fn selectors_for_partition(partition: Partition) -> &'static [TagSelector] {
    match partition {
        Partition::Cities => CITIES,
        Partition::Mountains => MOUNTAINS,
        Partition::Peaks => PEAKS,
        Partition::NaturalSites => NATURAL_SITES,
        Partition::CulturalSites => CULTURAL_SITES,
    }
}

/// Selectors for a single location type, or `None` when the type has no tag
/// mapping and the combined query should be used instead.
#[must_use]
pub fn selectors_for_type(kind: LocationType) -> Option<Vec<TagSelector>> {
    let selectors = match kind {
        LocationType::City => vec![TagSelector::new("place", &["city"])],
        LocationType::Town => vec![TagSelector::new("place", &["town"])],
        LocationType::Village => vec![TagSelector::new("place", &["village"])],
        LocationType::Hamlet => vec![TagSelector::new("place", &["hamlet"])],
        LocationType::Suburb => vec![TagSelector::new("place", &["suburb"])],
        LocationType::Neighbourhood => vec![TagSelector::new("place", &["neighbourhood"])],
        LocationType::Quarter => vec![TagSelector::new("place", &["quarter"])],
        LocationType::Locality => vec![TagSelector::new("place", &["locality"])],
        LocationType::IsolatedDwelling => {
            vec![TagSelector::new("place", &["isolated_dwelling"])]
        }
        LocationType::Municipality => vec![TagSelector::new("place", &["municipality"])],
        LocationType::Region => vec![TagSelector::new("place", &["region"])],
        LocationType::Island => vec![TagSelector::new("place", &["island"])],
        LocationType::Islet => vec![TagSelector::new("place", &["islet"])],
        LocationType::MountainRange => MOUNTAINS.to_vec(),
        LocationType::Peak => PEAKS.to_vec(),
        LocationType::Cave => vec![TagSelector::new("natural", &["cave_entrance", "cave"])],
        LocationType::Waterfall => vec![TagSelector::new("natural", &["waterfall"])],
        LocationType::AlpineHut => vec![TagSelector::new("tourism", &["alpine_hut"])],
        LocationType::Viewpoint => vec![TagSelector::new("tourism", &["viewpoint"])],
        LocationType::Museum => vec![TagSelector::new("tourism", &["museum"])],
        LocationType::Attraction => vec![TagSelector::new("tourism", &["attraction"])],
        LocationType::Castle => vec![TagSelector::new("historic", &["castle"])],
        LocationType::Fort => vec![TagSelector::new("historic", &["fort"])],
        LocationType::Ruins => vec![TagSelector::new("historic", &["ruins"])],
        LocationType::ArchaeologicalSite => {
            vec![TagSelector::new("historic", &["archaeological_site"])]
        }
        LocationType::Monastery => vec![TagSelector::new("historic", &["monastery"])],
        LocationType::Memorial => vec![TagSelector::new("historic", &["memorial"])],
        LocationType::Church => vec![
            TagSelector::new("historic", &["church"]),
            TagSelector::new("amenity", &["place_of_worship"]),
        ],
        LocationType::HistoricalSite => vec![TagSelector::new("historic", &[])],
        LocationType::PlaceOfWorship => vec![TagSelector::new("amenity", &["place_of_worship"])],
        LocationType::Unknown => return None,
    };
    Some(selectors)
}

/// Every category of interest, used for the unscoped combined query.
#[must_use]
pub fn combined_selectors() -> Vec<TagSelector> {
    Partition::ALL
        .into_iter()
        .flat_map(|partition| selectors_for_partition(partition).iter().copied())
        .collect()
}

/// Stages of the un-categorized search, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Places,
    NaturalFeatures,
    CulturalSites,
}

impl SearchStage {
    pub const ALL: [Self; 3] = [Self::Places, Self::NaturalFeatures, Self::CulturalSites];

    #[must_use]
    pub const fn selectors(self) -> &'static [TagSelector] {
        match self {
            Self::Places => CITIES,
            Self::NaturalFeatures => NATURAL_FEATURES,
            Self::CulturalSites => CULTURAL_SITES,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Places => "places",
            Self::NaturalFeatures => "natural features",
            Self::CulturalSites => "cultural sites",
        }
    }
}

/// Geographic scope every query is restricted to.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRegion {
    /// `(south, west, north, east)` in degrees.
    BoundingBox {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },
    /// Country area looked up by ISO 3166-1 alpha-2 code.
    Country(String),
}

impl SearchRegion {
    /// Bounding box of Bulgaria.
    #[must_use]
    pub const fn bulgaria() -> Self {
        Self::BoundingBox {
            south: 41.235,
            west: 22.357,
            north: 44.215,
            east: 28.609,
        }
    }

    fn prelude(&self) -> Option<String> {
        match self {
            Self::BoundingBox { .. } => None,
            Self::Country(code) => Some(format!(
                "area[\"ISO3166-1\"=\"{}\"][admin_level=2]->.searchArea;",
                escape_search_term(code)
            )),
        }
    }

    fn filter(&self) -> String {
        match self {
            Self::BoundingBox {
                south,
                west,
                north,
                east,
            } => format!("({south},{west},{north},{east})"),
            Self::Country(_) => "(area.searchArea)".to_string(),
        }
    }
}

impl Default for SearchRegion {
    fn default() -> Self {
        Self::bulgaria()
    }
}

/// Escapes a search term for embedding into an Overpass regex string.
///
/// Runs as a single pass so an inserted escape is never escaped again.
#[must_use]
pub fn escape_search_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        match ch {
            '\\' | '"' | '[' | ']' | '(' | ')' | '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}'
            | '|' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Renders one Overpass QL request matching `term` by name against every
/// selector, over nodes, ways and relations, returning centers and tags.
#[must_use]
pub fn build_query(
    term: &str,
    region: &SearchRegion,
    selectors: &[TagSelector],
    timeout_secs: u64,
) -> String {
    let name_filter = format!("[\"name\"~\"{}\",i]", escape_search_term(term));
    let area = region.filter();

    let mut query = format!("[out:json][timeout:{timeout_secs}];\n");
    if let Some(prelude) = region.prelude() {
        query.push_str(&prelude);
        query.push('\n');
    }
    query.push_str("(\n");
    for selector in selectors {
        let tag = selector.render();
        for element in ["node", "way", "relation"] {
            let _ = writeln!(query, "  {element}{tag}{name_filter}{area};");
        }
    }
    query.push_str(");\nout center tags;");
    query
}
