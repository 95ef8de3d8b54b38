use clap::{Parser, builder::BoolishValueParser};
use geoloc_core::enrich::{WikidataConfig, WikipediaConfig};
use geoloc_core::enrich::wikidata::DEFAULT_WIKIDATA_ENDPOINT;
use geoloc_core::enrich::wikipedia::DEFAULT_SUMMARY_ENDPOINT;
use geoloc_core::overpass::{DEFAULT_OVERPASS_URL, OverpassConfig, SearchRegion};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_NAMESPACE: &str = "geoloc";
const DEFAULT_DB_NAME: &str = "locations";
const DEFAULT_TRANSPORT: &str = "stdio";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_ADMIN_ADDR: &str = "127.0.0.1:4030";
const DEFAULT_ADMIN_RATE_LIMIT: u32 = 60;
const DEFAULT_ADMIN_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_OVERPASS_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ENRICH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_FALLBACK_LANGUAGE: &str = "bg";

#[derive(Parser, Debug)]
#[command(name = "geoloc-mcpd", version, about = "Geoloc MCP daemon.")]
struct CliArgs {
    #[arg(long, env = "GEOLOC_DB_NAMESPACE", default_value = DEFAULT_DB_NAMESPACE)]
    db_namespace: String,

    #[arg(long, env = "GEOLOC_DB_NAME", default_value = DEFAULT_DB_NAME)]
    db_name: String,

    #[arg(
        long,
        env = "GEOLOC_DB_IN_MEMORY",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    db_in_memory: bool,

    #[arg(long, env = "GEOLOC_DB_URI")]
    db_uri: Option<String>,

    #[arg(long, env = "GEOLOC_DB_USERNAME")]
    db_username: Option<String>,

    #[arg(long, env = "GEOLOC_DB_PASSWORD")]
    db_password: Option<String>,

    /// `stdio` or `http`.
    #[arg(long, env = "GEOLOC_TRANSPORT", default_value = DEFAULT_TRANSPORT)]
    transport: String,

    #[arg(long, env = "GEOLOC_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "GEOLOC_ADMIN_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    admin_serve: bool,

    #[arg(long, env = "GEOLOC_ADMIN_ADDR", default_value = DEFAULT_ADMIN_ADDR)]
    admin_addr: SocketAddr,

    #[arg(
        long,
        env = "GEOLOC_ADMIN_RATE_LIMIT",
        default_value_t = DEFAULT_ADMIN_RATE_LIMIT
    )]
    admin_rate_limit: u32,

    #[arg(
        long,
        env = "GEOLOC_ADMIN_RATE_WINDOW_SECS",
        default_value_t = DEFAULT_ADMIN_RATE_WINDOW_SECS
    )]
    admin_rate_window_secs: u64,

    #[arg(long, env = "GEOLOC_OVERPASS_URL", default_value = DEFAULT_OVERPASS_URL)]
    overpass_url: String,

    #[arg(long, env = "GEOLOC_WIKIPEDIA_URL", default_value = DEFAULT_SUMMARY_ENDPOINT)]
    wikipedia_url: String,

    #[arg(long, env = "GEOLOC_WIKIDATA_URL", default_value = DEFAULT_WIKIDATA_ENDPOINT)]
    wikidata_url: String,

    #[arg(
        long,
        env = "GEOLOC_OVERPASS_TIMEOUT_SECS",
        default_value_t = DEFAULT_OVERPASS_TIMEOUT_SECS
    )]
    overpass_timeout_secs: u64,

    #[arg(
        long,
        env = "GEOLOC_ENRICH_TIMEOUT_SECS",
        default_value_t = DEFAULT_ENRICH_TIMEOUT_SECS
    )]
    enrich_timeout_secs: u64,

    /// `south,west,north,east`; defaults to Bulgaria.
    #[arg(long, env = "GEOLOC_REGION_BBOX")]
    region_bbox: Option<String>,

    /// ISO 3166-1 alpha-2 code; takes precedence over the bounding box.
    #[arg(long, env = "GEOLOC_REGION_COUNTRY")]
    region_country: Option<String>,

    #[arg(long, env = "GEOLOC_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    language: String,

    #[arg(long, env = "GEOLOC_FALLBACK_LANGUAGE", default_value = DEFAULT_FALLBACK_LANGUAGE)]
    fallback_language: String,
}

/// MCP transport served by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            _ => Err(ConfigError::InvalidSetting {
                name: "GEOLOC_TRANSPORT",
                value: value.to_string(),
            }),
        }
    }
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct GeolocConfig {
    pub db_namespace: String,
    pub db_name: String,
    pub db_in_memory: bool,
    pub db_uri: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub transport: Transport,
    pub mcp_http_addr: SocketAddr,
    pub admin_serve: bool,
    pub admin_addr: SocketAddr,
    pub admin_rate_limit: u32,
    pub admin_rate_window: Duration,
    pub overpass_url: String,
    pub wikipedia_url: String,
    pub wikidata_url: String,
    pub overpass_timeout: Duration,
    pub enrich_timeout: Duration,
    pub region: SearchRegion,
    pub language: String,
    pub fallback_language: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl GeolocConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }

    pub fn overpass_config(&self) -> OverpassConfig {
        OverpassConfig::new(self.overpass_url.clone())
            .with_timeout(self.overpass_timeout)
            .with_region(self.region.clone())
    }

    pub fn wikipedia_config(&self) -> WikipediaConfig {
        WikipediaConfig::new(self.wikipedia_url.clone()).with_timeout(self.enrich_timeout)
    }

    pub fn wikidata_config(&self) -> WikidataConfig {
        WikidataConfig::new(self.wikidata_url.clone())
            .with_timeout(self.enrich_timeout)
            .with_languages(self.language.clone(), self.fallback_language.clone())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn require_text(name: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidSetting { name, value });
    }
    Ok(trimmed.to_string())
}

fn require_positive(name: &'static str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidSetting {
            name,
            value: value.to_string(),
        });
    }
    Ok(Duration::from_secs(value))
}

/// Parses `south,west,north,east` in degrees.
fn parse_bbox(value: &str) -> Result<SearchRegion, ConfigError> {
    let invalid = || ConfigError::InvalidSetting {
        name: "GEOLOC_REGION_BBOX",
        value: value.to_string(),
    };
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let [south, west, north, east] = parts[..] else {
        return Err(invalid());
    };

    let latitudes_ok = (-90.0..=90.0).contains(&south) && (-90.0..=90.0).contains(&north);
    let longitudes_ok = (-180.0..=180.0).contains(&west) && (-180.0..=180.0).contains(&east);
    if !latitudes_ok || !longitudes_ok || south >= north || west >= east {
        return Err(invalid());
    }
    Ok(SearchRegion::BoundingBox {
        south,
        west,
        north,
        east,
    })
}

fn parse_region(
    bbox: Option<String>,
    country: Option<String>,
) -> Result<SearchRegion, ConfigError> {
    if let Some(country) = non_blank(country) {
        let code = country.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidSetting {
                name: "GEOLOC_REGION_COUNTRY",
                value: country,
            });
        }
        return Ok(SearchRegion::Country(code));
    }
    match non_blank(bbox) {
        Some(bbox) => parse_bbox(&bbox),
        None => Ok(SearchRegion::default()),
    }
}

impl TryFrom<CliArgs> for GeolocConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let db_uri = non_blank(args.db_uri);
        let db_username = non_blank(args.db_username);
        let db_password = non_blank(args.db_password);

        let db_in_memory = args.db_in_memory || db_uri.is_none();

        if !db_in_memory {
            if db_username.is_none() {
                return Err(ConfigError::MissingSetting("GEOLOC_DB_USERNAME"));
            }
            if db_password.is_none() {
                return Err(ConfigError::MissingSetting("GEOLOC_DB_PASSWORD"));
            }
        }

        if args.admin_rate_limit == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "GEOLOC_ADMIN_RATE_LIMIT",
                value: args.admin_rate_limit.to_string(),
            });
        }

        Ok(Self {
            db_namespace: require_text("GEOLOC_DB_NAMESPACE", args.db_namespace)?,
            db_name: require_text("GEOLOC_DB_NAME", args.db_name)?,
            db_in_memory,
            db_uri,
            db_username,
            db_password,
            transport: args.transport.parse()?,
            mcp_http_addr: args.mcp_http_addr,
            admin_serve: args.admin_serve,
            admin_addr: args.admin_addr,
            admin_rate_limit: args.admin_rate_limit,
            admin_rate_window: require_positive(
                "GEOLOC_ADMIN_RATE_WINDOW_SECS",
                args.admin_rate_window_secs,
            )?,
            overpass_url: require_text("GEOLOC_OVERPASS_URL", args.overpass_url)?,
            wikipedia_url: require_text("GEOLOC_WIKIPEDIA_URL", args.wikipedia_url)?,
            wikidata_url: require_text("GEOLOC_WIKIDATA_URL", args.wikidata_url)?,
            overpass_timeout: require_positive(
                "GEOLOC_OVERPASS_TIMEOUT_SECS",
                args.overpass_timeout_secs,
            )?,
            enrich_timeout: require_positive(
                "GEOLOC_ENRICH_TIMEOUT_SECS",
                args.enrich_timeout_secs,
            )?,
            region: parse_region(args.region_bbox, args.region_country)?,
            language: require_text("GEOLOC_LANGUAGE", args.language)?.to_ascii_lowercase(),
            fallback_language: require_text("GEOLOC_FALLBACK_LANGUAGE", args.fallback_language)?
                .to_ascii_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            db_namespace: DEFAULT_DB_NAMESPACE.to_string(),
            db_name: DEFAULT_DB_NAME.to_string(),
            db_in_memory: true,
            db_uri: None,
            db_username: None,
            db_password: None,
            transport: DEFAULT_TRANSPORT.to_string(),
            mcp_http_addr: DEFAULT_MCP_HTTP_ADDR.parse().expect("valid MCP addr"),
            admin_serve: false,
            admin_addr: DEFAULT_ADMIN_ADDR.parse().expect("valid admin addr"),
            admin_rate_limit: DEFAULT_ADMIN_RATE_LIMIT,
            admin_rate_window_secs: DEFAULT_ADMIN_RATE_WINDOW_SECS,
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            wikipedia_url: DEFAULT_SUMMARY_ENDPOINT.to_string(),
            wikidata_url: DEFAULT_WIKIDATA_ENDPOINT.to_string(),
            overpass_timeout_secs: DEFAULT_OVERPASS_TIMEOUT_SECS,
            enrich_timeout_secs: DEFAULT_ENRICH_TIMEOUT_SECS,
            region_bbox: None,
            region_country: None,
            language: DEFAULT_LANGUAGE.to_string(),
            fallback_language: DEFAULT_FALLBACK_LANGUAGE.to_string(),
        }
    }

    #[test]
    fn defaults_to_in_memory_when_db_uri_missing() {
        let mut args = base_args();
        args.db_in_memory = false;

        let config = GeolocConfig::try_from(args).expect("config should parse");

        assert!(config.db_in_memory);
        assert!(config.db_uri.is_none());
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.region, SearchRegion::bulgaria());
    }

    #[test]
    fn remote_database_requires_credentials() {
        let mut args = base_args();
        args.db_in_memory = false;
        args.db_uri = Some("ws://127.0.0.1:8000".to_string());
        args.db_password = Some("secret".to_string());

        let err = GeolocConfig::try_from(args).expect_err("username is missing");
        assert_eq!(err.to_string(), "missing required setting: GEOLOC_DB_USERNAME");
    }

    #[test]
    fn parses_transport_and_rejects_unknown() {
        let mut args = base_args();
        args.transport = " HTTP ".to_string();
        let config = GeolocConfig::try_from(args).expect("config should parse");
        assert_eq!(config.transport, Transport::Http);

        let mut args = base_args();
        args.transport = "grpc".to_string();
        assert!(matches!(
            GeolocConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "GEOLOC_TRANSPORT", .. })
        ));
    }

    #[test]
    fn parses_region_settings() {
        let mut args = base_args();
        args.region_bbox = Some("45.8, 13.3, 46.9, 16.7".to_string());
        let config = GeolocConfig::try_from(args).expect("config should parse");
        assert_eq!(
            config.region,
            SearchRegion::BoundingBox {
                south: 45.8,
                west: 13.3,
                north: 46.9,
                east: 16.7,
            }
        );

        let mut args = base_args();
        args.region_bbox = Some("45.8,13.3,46.9,16.7".to_string());
        args.region_country = Some("si".to_string());
        let config = GeolocConfig::try_from(args).expect("config should parse");
        assert_eq!(config.region, SearchRegion::Country("SI".to_string()));

        for bad in ["1,2,3", "46.9,13.3,45.8,16.7", "north,1,2,3", "0,0,95,1"] {
            let mut args = base_args();
            args.region_bbox = Some(bad.to_string());
            assert!(
                GeolocConfig::try_from(args).is_err(),
                "bbox {bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_limits_and_blank_names() {
        let mut args = base_args();
        args.admin_rate_limit = 0;
        assert!(GeolocConfig::try_from(args).is_err());

        let mut args = base_args();
        args.enrich_timeout_secs = 0;
        assert!(GeolocConfig::try_from(args).is_err());

        let mut args = base_args();
        args.db_namespace = "  ".to_string();
        assert!(matches!(
            GeolocConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "GEOLOC_DB_NAMESPACE", .. })
        ));
    }

    #[test]
    fn client_configs_carry_settings() {
        let mut args = base_args();
        args.language = "BG".to_string();
        args.fallback_language = "en".to_string();
        args.enrich_timeout_secs = 5;
        let config = GeolocConfig::try_from(args).expect("config should parse");

        let wikidata = config.wikidata_config();
        assert_eq!(wikidata.language, "bg");
        assert_eq!(wikidata.fallback_language, "en");
        assert_eq!(wikidata.timeout, Duration::from_secs(5));
        assert_eq!(config.overpass_config().base_url, DEFAULT_OVERPASS_URL);
    }
}
