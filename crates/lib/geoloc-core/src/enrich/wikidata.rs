use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use geoloc_store::Coordinates;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::upstream::{UpstreamError, build_client};

use super::{Facts, FactsSource, RetryPolicy};

const SERVICE: &str = "wikidata";

pub const DEFAULT_WIKIDATA_ENDPOINT: &str = "https://www.wikidata.org/w/api.php";
pub const COMMONS_FILE_PATH: &str = "https://commons.wikimedia.org/wiki/Special:FilePath/";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

const PROP_POPULATION: &str = "P1082";
const PROP_ELEVATION: &str = "P2044";
const PROP_AREA: &str = "P2046";
const PROP_WEBSITE: &str = "P856";
const PROP_IMAGE: &str = "P18";
const PROP_COORDINATES: &str = "P625";

static ENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Q[1-9][0-9]*$").unwrap_or_else(|err| panic!("invalid entity pattern: {err}"))
});

#[derive(Debug, Clone)]
pub struct WikidataConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub language: String,
    pub fallback_language: String,
    pub retry: RetryPolicy,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_WIKIDATA_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            language: "en".to_string(),
            fallback_language: "bg".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl WikidataConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_languages(
        mut self,
        language: impl Into<String>,
        fallback_language: impl Into<String>,
    ) -> Self {
        self.language = language.into();
        self.fallback_language = fallback_language.into();
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Client for the Wikidata `wbgetentities` API.
#[derive(Debug, Clone)]
pub struct WikidataClient {
    client: Client,
    config: WikidataConfig,
}

impl WikidataClient {
    /// # Errors
    /// Returns `UpstreamError::Client` if the HTTP client fails to build.
    pub fn with_config(config: WikidataConfig) -> Result<Self, UpstreamError> {
        let client = build_client(SERVICE, config.timeout)?;
        Ok(Self { client, config })
    }

    async fn fetch_entities(&self, id: &str) -> Result<EntitiesResponse, UpstreamError> {
        let languages = format!("{}|{}", self.config.language, self.config.fallback_language);
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("action", "wbgetentities"),
                ("format", "json"),
                ("ids", id),
                ("props", "labels|descriptions|claims"),
                ("languages", languages.as_str()),
            ])
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, &err, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::from_status(SERVICE, status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, &err, self.config.timeout))
    }
}

/// Whether `id` looks like a Wikidata item id.
#[must_use]
pub fn is_entity_id(id: &str) -> bool {
    ENTITY_PATTERN.is_match(id)
}

#[async_trait]
impl FactsSource for WikidataClient {
    async fn facts(&self, id: &str) -> Result<Option<Facts>, UpstreamError> {
        let id = id.trim();
        if !is_entity_id(id) {
            return Ok(None);
        }
        let client = self;
        let response = self
            .config
            .retry
            .run(SERVICE, move |_| client.fetch_entities(id))
            .await?;
        let facts = extract_facts(
            id,
            response,
            &self.config.language,
            &self.config.fallback_language,
        );
        if facts.is_none() {
            debug!(id, "wikidata entity not found");
        }
        Ok(facts)
    }
}

#[derive(Debug, Default, Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, Entity>,
}

#[derive(Debug, Default, Deserialize)]
struct Entity {
    missing: Option<Value>,
    #[serde(default)]
    labels: HashMap<String, LangValue>,
    #[serde(default)]
    descriptions: HashMap<String, LangValue>,
    #[serde(default)]
    claims: HashMap<String, Vec<Statement>>,
}

#[derive(Debug, Deserialize)]
struct LangValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Statement {
    mainsnak: Snak,
    #[serde(default)]
    rank: String,
}

#[derive(Debug, Deserialize)]
struct Snak {
    datavalue: Option<DataValue>,
}

#[derive(Debug, Deserialize)]
struct DataValue {
    value: Value,
}

impl Entity {
    fn localized(values: &HashMap<String, LangValue>, primary: &str, fallback: &str) -> Option<String> {
        let usable = |lang: &str| {
            values
                .get(lang)
                .map(|entry| entry.value.trim())
                .filter(|value| !value.is_empty())
        };
        usable(primary).or_else(|| usable(fallback)).map(str::to_string)
    }

    /// Preferred-rank statements if any exist, else every non-deprecated one.
    fn best_values(&self, property: &str) -> Vec<&Value> {
        let Some(statements) = self.claims.get(property) else {
            return Vec::new();
        };
        let preferred: Vec<&Statement> = statements
            .iter()
            .filter(|statement| statement.rank == "preferred")
            .collect();
        let chosen = if preferred.is_empty() {
            statements
                .iter()
                .filter(|statement| statement.rank != "deprecated")
                .collect()
        } else {
            preferred
        };
        chosen
            .into_iter()
            .filter_map(|statement| statement.mainsnak.datavalue.as_ref())
            .map(|datavalue| &datavalue.value)
            .collect()
    }

    fn quantity(&self, property: &str) -> Option<f64> {
        self.best_values(property).into_iter().find_map(|value| {
            value
                .get("amount")
                .and_then(Value::as_str)
                .and_then(|amount| amount.trim_start_matches('+').parse::<f64>().ok())
        })
    }

    fn string(&self, property: &str) -> Option<String> {
        self.strings(property).into_iter().next()
    }

    fn strings(&self, property: &str) -> Vec<String> {
        self.best_values(property)
            .into_iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn coordinates(&self) -> Option<Coordinates> {
        self.best_values(PROP_COORDINATES).into_iter().find_map(|value| {
            let lat = value.get("latitude").and_then(Value::as_f64)?;
            let lon = value.get("longitude").and_then(Value::as_f64)?;
            Some(Coordinates::new(lat, lon))
        })
    }
}

fn extract_facts(
    id: &str,
    mut response: EntitiesResponse,
    language: &str,
    fallback_language: &str,
) -> Option<Facts> {
    let entity = response.entities.remove(id)?;
    if entity.missing.is_some() {
        return None;
    }
    Some(Facts {
        id: id.to_string(),
        label: Entity::localized(&entity.labels, language, fallback_language),
        description: Entity::localized(&entity.descriptions, language, fallback_language),
        population: entity.quantity(PROP_POPULATION),
        elevation: entity.quantity(PROP_ELEVATION),
        area: entity.quantity(PROP_AREA),
        website: entity.string(PROP_WEBSITE),
        images: entity
            .strings(PROP_IMAGE)
            .iter()
            .filter_map(|file| commons_file_url(file))
            .collect(),
        coordinates: entity.coordinates(),
    })
}

/// Public Commons URL for a raw image file name.
#[must_use]
pub fn commons_file_url(file_name: &str) -> Option<String> {
    let mut url = Url::parse(COMMONS_FILE_PATH).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push(&file_name.trim().replace(' ', "_"));
    Some(url.to_string())
}
