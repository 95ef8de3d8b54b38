use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::upstream::{UpstreamError, build_client};

use super::{NarrativeSource, Summary};

const SERVICE: &str = "wikipedia";

/// `{lang}` is replaced with the language prefix of the page tag.
pub const DEFAULT_SUMMARY_ENDPOINT: &str = "https://{lang}.wikipedia.org/api/rest_v1/page/summary/";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

static LANG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[a-z0-9]+)*$").unwrap_or_else(|err| panic!("invalid lang pattern: {err}"))
});

#[derive(Debug, Clone)]
pub struct WikipediaConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SUMMARY_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl WikipediaConfig {
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
}

/// Client for the Wikipedia REST page summary endpoint.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    client: Client,
    config: WikipediaConfig,
}

impl WikipediaClient {
    /// # Errors
    /// Returns `UpstreamError::Client` if the HTTP client fails to build.
    pub fn with_config(config: WikipediaConfig) -> Result<Self, UpstreamError> {
        let client = build_client(SERVICE, config.timeout)?;
        Ok(Self { client, config })
    }

    fn summary_url(&self, lang: &str, title: &str) -> Option<Url> {
        let base = self.config.endpoint.replace("{lang}", lang);
        let mut url = Url::parse(&base).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(&title.replace(' ', "_"));
        Some(url)
    }
}

/// Splits a `lang:title` page tag.
#[must_use]
pub fn parse_page_tag(tag: &str) -> Option<(String, String)> {
    let (lang, title) = tag.split_once(':')?;
    let lang = lang.trim().to_lowercase();
    let title = title.trim();
    if title.is_empty() || !LANG_PATTERN.is_match(&lang) {
        return None;
    }
    Some((lang, title.to_string()))
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    title: Option<String>,
    extract: Option<String>,
    lang: Option<String>,
    content_urls: Option<ContentUrls>,
    thumbnail: Option<ImageRef>,
    originalimage: Option<ImageRef>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    source: Option<String>,
}

impl SummaryResponse {
    fn into_summary(self, lang: &str) -> Summary {
        Summary {
            title: self.title,
            extract: self.extract.filter(|text| !text.trim().is_empty()),
            url: self
                .content_urls
                .and_then(|urls| urls.desktop)
                .and_then(|desktop| desktop.page),
            lang: self.lang.or_else(|| Some(lang.to_string())),
            thumbnail: self.thumbnail.and_then(|image| image.source),
            original_image: self.originalimage.and_then(|image| image.source),
        }
    }
}

#[async_trait]
impl NarrativeSource for WikipediaClient {
    async fn summary(&self, tag: &str) -> Result<Option<Summary>, UpstreamError> {
        let Some((lang, title)) = parse_page_tag(tag) else {
            return Ok(None);
        };
        let Some(url) = self.summary_url(&lang, &title) else {
            return Ok(None);
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, &err, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            debug!(tag, status = status.as_u16(), "no wikipedia summary");
            return Ok(None);
        }

        let body: SummaryResponse = response
            .json()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, &err, self.config.timeout))?;
        Ok(Some(body.into_summary(&lang)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_tags_need_language_prefix() {
        assert_eq!(
            parse_page_tag("bg:Рила"),
            Some(("bg".to_string(), "Рила".to_string()))
        );
        assert_eq!(
            parse_page_tag("en:Sofia: City"),
            Some(("en".to_string(), "Sofia: City".to_string()))
        );
        assert_eq!(parse_page_tag("Sofia"), None);
        assert_eq!(parse_page_tag("en:"), None);
        assert_eq!(parse_page_tag("not a lang:Sofia"), None);
    }

    #[test]
    fn summary_url_encodes_title() {
        let client = WikipediaClient::with_config(WikipediaConfig::default()).unwrap();
        let url = client.summary_url("en", "Veliko Tarnovo").unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Veliko_Tarnovo"
        );
    }

    #[test]
    fn summary_response_maps_urls_and_images() {
        let body: SummaryResponse = serde_json::from_value(serde_json::json!({
            "title": "Sofia",
            "extract": "Sofia is the capital of Bulgaria.",
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Sofia"}},
            "thumbnail": {"source": "https://upload.wikimedia.org/thumb.jpg"},
            "originalimage": {"source": "https://upload.wikimedia.org/full.jpg"}
        }))
        .unwrap();

        let summary = body.into_summary("en");

        assert_eq!(summary.lang.as_deref(), Some("en"));
        assert_eq!(summary.url.as_deref(), Some("https://en.wikipedia.org/wiki/Sofia"));
        assert_eq!(
            summary.primary_image(),
            Some("https://upload.wikimedia.org/full.jpg")
        );
    }
}
