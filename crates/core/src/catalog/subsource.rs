//! SubSource API client.
//!
//! The API sits behind a bot check that expects browser-like headers, and
//! optionally a clearance cookie obtained from a real browser session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, Response, Url};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::CatalogConfig;
use crate::json;

use super::{
    Catalog, CatalogCandidate, CatalogError, CatalogKind, DownloadedArchive, SeasonEntry,
    SubtitleCandidate,
};

const SITE_ORIGIN: &str = "https://subsource.net";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// SubSource catalog client.
pub struct SubSourceClient {
    client: Client,
    api_url: String,
    search_limit: u32,
}

impl SubSourceClient {
    /// Create a new SubSource client.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let api_url = config.api_url.trim_end_matches('/').to_string();
        let base = Url::parse(&api_url)
            .map_err(|e| CatalogError::NotConfigured(format!("Invalid catalog URL: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ORIGIN, HeaderValue::from_static(SITE_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static("https://subsource.net/"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let jar = Arc::new(Jar::default());
        if let Some(clearance) = config.cf_clearance.as_deref().filter(|c| !c.is_empty()) {
            jar.add_cookie_str(&format!("cf_clearance={}", clearance), &base);
            debug!("Using clearance cookie for catalog requests");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .default_headers(headers)
            .cookie_provider(jar)
            .build()?;

        Ok(Self {
            client,
            api_url,
            search_limit: config.search_limit,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    async fn check(response: Response, what: &str) -> Result<Response, CatalogError> {
        let status = response.status();
        if status == 429 {
            return Err(CatalogError::RateLimitExceeded);
        }
        if status == 404 {
            return Err(CatalogError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }

    async fn json_body(response: Response, what: &str) -> Result<Value, CatalogError> {
        response.json().await.map_err(|e| {
            CatalogError::ParseError(format!("Failed to parse {} response: {}", what, e))
        })
    }
}

#[async_trait]
impl Catalog for SubSourceClient {
    fn name(&self) -> &str {
        "subsource"
    }

    async fn search_title(
        &self,
        query: &str,
        include_series: bool,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        let url = self.url("movie/search");
        debug!(query = %query, include_series, "SubSource title search");

        let payload = json!({
            "query": query,
            "signal": {},
            "includeSeasons": include_series,
            "limit": self.search_limit,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response, "title search").await?;
        let body = Self::json_body(response, "title search").await?;

        Ok(parse_search_results(&body))
    }

    async fn list_subtitles(
        &self,
        locator: &str,
        language: &str,
    ) -> Result<Vec<SubtitleCandidate>, CatalogError> {
        let url = self.url(locator);
        debug!(locator = %locator, language = %language, "SubSource subtitle listing");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("language", language.to_lowercase().as_str()),
                ("sort_by_date", "false"),
            ])
            .send()
            .await?;
        let response = Self::check(response, locator).await?;
        let body = Self::json_body(response, "subtitle listing").await?;

        Ok(parse_subtitle_listing(&body, language))
    }

    async fn resolve_download_token(
        &self,
        subtitle_locator: &str,
    ) -> Result<Option<String>, CatalogError> {
        let url = self.url(&format!("subtitle/{}", subtitle_locator.trim_start_matches('/')));
        debug!(locator = %subtitle_locator, "SubSource download token");

        let response = self.client.get(&url).send().await?;
        let response = Self::check(response, subtitle_locator).await?;
        let body = Self::json_body(response, "subtitle details").await?;

        Ok(parse_download_token(&body))
    }

    async fn download_archive(&self, token: &str) -> Result<DownloadedArchive, CatalogError> {
        let url = self.url(&format!("subtitle/download/{}", urlencoding::encode(token)));

        let response = self.client.get(&url).send().await?;
        let response = Self::check(response, "subtitle download").await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        debug!(bytes = bytes.len(), content_type = ?content_type, "SubSource archive downloaded");

        Ok(DownloadedArchive {
            bytes,
            content_type,
        })
    }
}

fn year(value: Option<&Value>) -> Option<i32> {
    json::int(value).and_then(|y| i32::try_from(y).ok())
}

fn parse_season(value: &Value) -> Option<SeasonEntry> {
    let season = json::int(value.get("season")).and_then(|s| u32::try_from(s).ok())?;
    Some(SeasonEntry {
        season,
        locator: json::text(value.get("link")).unwrap_or_default(),
        release_year: year(value.get("releaseYear")),
    })
}

/// Canonical candidates from a title search response.
pub(crate) fn parse_search_results(body: &Value) -> Vec<CatalogCandidate> {
    json::list(body, &["results"])
        .iter()
        .filter_map(|item| {
            let title = json::text(item.get("title"))?;
            let kind = match json::text(item.get("type")).map(|t| t.to_lowercase()) {
                Some(t) if t == "tvseries" || t == "series" => CatalogKind::Series,
                _ => CatalogKind::Movie,
            };
            let seasons = item
                .get("seasons")
                .and_then(Value::as_array)
                .map(|s| s.iter().filter_map(parse_season).collect())
                .unwrap_or_default();
            Some(CatalogCandidate {
                title,
                kind,
                release_year: year(item.get("releaseYear")),
                locator: json::text(item.get("link")).unwrap_or_default(),
                seasons,
            })
        })
        .collect()
}

/// Canonical subtitle candidates from a listing response.
pub(crate) fn parse_subtitle_listing(body: &Value, language: &str) -> Vec<SubtitleCandidate> {
    json::list(body, &["subtitles"])
        .iter()
        .filter_map(|item| {
            let id = json::text(item.get("id"))?;
            Some(SubtitleCandidate {
                id,
                release_info: json::text(item.get("release_info")).unwrap_or_default(),
                language: json::text(item.get("language")).unwrap_or_else(|| language.to_string()),
                locator: json::text(item.get("link")).unwrap_or_default(),
                hearing_impaired: json::flag(item.get("hearing_impaired")),
                rating: json::text(item.get("rating")),
                upload_date: json::text(item.get("upload_date")),
            })
        })
        .collect()
}

/// Download token from a subtitle details response.
pub(crate) fn parse_download_token(body: &Value) -> Option<String> {
    json::text(body.get("subtitle").and_then(|s| s.get("download_token")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_results() {
        let body = json!({
            "results": [
                {"title": "Nightcrawler", "type": "movie", "releaseYear": 2014, "link": "/subtitles/nightcrawler-2014"},
                {"title": "Breaking Bad", "type": "TVSeries", "releaseYear": "2008", "link": "/subtitles/breaking-bad",
                 "seasons": [
                    {"season": 1, "link": "/subtitles/breaking-bad/season=1", "releaseYear": 2008},
                    {"season": "2", "link": "/subtitles/breaking-bad/season=2"},
                    {"link": "/no-number"}
                 ]},
                {"type": "movie", "link": "/untitled"}
            ]
        });

        let results = parse_search_results(&body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].kind, CatalogKind::Movie);
        assert_eq!(results[0].release_year, Some(2014));

        let series = &results[1];
        assert_eq!(series.kind, CatalogKind::Series);
        assert_eq!(series.release_year, Some(2008));
        assert_eq!(series.seasons.len(), 2);
        assert_eq!(series.seasons[1].season, 2);
        assert_eq!(series.seasons[1].release_year, None);
    }

    #[test]
    fn test_parse_search_results_unexpected_shape() {
        assert!(parse_search_results(&json!({"error": "nope"})).is_empty());
        assert!(parse_search_results(&json!("text")).is_empty());
    }

    #[test]
    fn test_parse_subtitle_listing_shapes() {
        let wrapped = json!({"subtitles": [
            {"id": 123, "release_info": "Nightcrawler.2014.1080p", "language": "english",
             "link": "nightcrawler-2014/english/123", "hearing_impaired": 1, "rating": "good"}
        ]});
        let subs = parse_subtitle_listing(&wrapped, "english");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, "123");
        assert!(subs[0].hearing_impaired);
        assert_eq!(subs[0].rating.as_deref(), Some("good"));

        let bare = json!([{"id": "a1", "link": "x/y/a1"}]);
        let subs = parse_subtitle_listing(&bare, "french");
        assert_eq!(subs[0].language, "french");
        assert_eq!(subs[0].release_info, "");
        assert!(!subs[0].hearing_impaired);
    }

    #[test]
    fn test_parse_download_token() {
        assert_eq!(
            parse_download_token(&json!({"subtitle": {"download_token": "tok"}})).as_deref(),
            Some("tok")
        );
        assert_eq!(parse_download_token(&json!({"subtitle": {}})), None);
        assert_eq!(parse_download_token(&json!({"subtitle": {"download_token": ""}})), None);
        assert_eq!(parse_download_token(&json!([])), None);
    }

    #[test]
    fn test_client_builds_urls() {
        let client = SubSourceClient::new(&CatalogConfig {
            api_url: "https://api.example.com/v1/".to_string(),
            cf_clearance: Some("abc".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.url("/subtitles/nightcrawler-2014"),
            "https://api.example.com/v1/subtitles/nightcrawler-2014"
        );
        assert_eq!(client.name(), "subsource");
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        let result = SubSourceClient::new(&CatalogConfig {
            api_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(CatalogError::NotConfigured(_))));
    }
}
