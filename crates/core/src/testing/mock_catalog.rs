//! Mock subtitle catalog for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{
    Catalog, CatalogCandidate, CatalogError, DownloadedArchive, SubtitleCandidate,
};

/// A recorded catalog call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCatalogCall {
    SearchTitle { query: String, include_series: bool },
    ListSubtitles { locator: String, language: String },
    ResolveToken { locator: String },
    DownloadArchive { token: String },
}

/// Mock implementation of the Catalog trait.
///
/// Search results are keyed by lower-cased query, listings by locator,
/// tokens by subtitle locator and archives by token. Anything not
/// configured behaves like an empty catalog: no results, no token, and a
/// `NotFound` on download.
#[derive(Debug)]
pub struct MockCatalog {
    search_results: Arc<RwLock<HashMap<String, Vec<CatalogCandidate>>>>,
    listings: Arc<RwLock<HashMap<String, Vec<SubtitleCandidate>>>>,
    tokens: Arc<RwLock<HashMap<String, String>>>,
    archives: Arc<RwLock<HashMap<String, DownloadedArchive>>>,
    calls: Arc<RwLock<Vec<RecordedCatalogCall>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    /// Create a new empty mock catalog.
    pub fn new() -> Self {
        Self {
            search_results: Arc::new(RwLock::new(HashMap::new())),
            listings: Arc::new(RwLock::new(HashMap::new())),
            tokens: Arc::new(RwLock::new(HashMap::new())),
            archives: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Set the results returned for a search query.
    pub async fn add_search_results(&self, query: &str, results: Vec<CatalogCandidate>) {
        self.search_results
            .write()
            .await
            .insert(query.to_lowercase(), results);
    }

    /// Set the subtitles listed under a locator.
    pub async fn add_listing(&self, locator: &str, subtitles: Vec<SubtitleCandidate>) {
        self.listings
            .write()
            .await
            .insert(locator.to_string(), subtitles);
    }

    /// Set the download token for a subtitle locator.
    pub async fn add_token(&self, subtitle_locator: &str, token: &str) {
        self.tokens
            .write()
            .await
            .insert(subtitle_locator.to_string(), token.to_string());
    }

    /// Set the archive served for a token.
    pub async fn add_archive(&self, token: &str, archive: DownloadedArchive) {
        self.archives
            .write()
            .await
            .insert(token.to_string(), archive);
    }

    /// Wire a subtitle end to end: token `tok-{id}` serving `archive`.
    pub async fn add_download(&self, subtitle: &SubtitleCandidate, archive: DownloadedArchive) {
        let token = format!("tok-{}", subtitle.id);
        self.add_token(&subtitle.locator, &token).await;
        self.add_archive(&token, archive).await;
    }

    // =========================================================================
    // Call Recording
    // =========================================================================

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedCatalogCall> {
        self.calls.read().await.clone()
    }

    /// (locator, language) of every listing call.
    pub async fn recorded_listings(&self) -> Vec<(String, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCatalogCall::ListSubtitles { locator, language } => {
                    Some((locator.clone(), language.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Get the number of calls performed.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<CatalogError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, call: RecordedCatalogCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_title(
        &self,
        query: &str,
        include_series: bool,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        self.record(RecordedCatalogCall::SearchTitle {
            query: query.to_string(),
            include_series,
        })
        .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let results = self
            .search_results
            .read()
            .await
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default();

        if include_series {
            Ok(results)
        } else {
            Ok(results.into_iter().filter(|c| !c.is_series()).collect())
        }
    }

    async fn list_subtitles(
        &self,
        locator: &str,
        language: &str,
    ) -> Result<Vec<SubtitleCandidate>, CatalogError> {
        self.record(RecordedCatalogCall::ListSubtitles {
            locator: locator.to_string(),
            language: language.to_string(),
        })
        .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self
            .listings
            .read()
            .await
            .get(locator)
            .map(|subs| {
                subs.iter()
                    .filter(|s| s.language.eq_ignore_ascii_case(language))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn resolve_download_token(
        &self,
        subtitle_locator: &str,
    ) -> Result<Option<String>, CatalogError> {
        self.record(RecordedCatalogCall::ResolveToken {
            locator: subtitle_locator.to_string(),
        })
        .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self.tokens.read().await.get(subtitle_locator).cloned())
    }

    async fn download_archive(&self, token: &str) -> Result<DownloadedArchive, CatalogError> {
        self.record(RecordedCatalogCall::DownloadArchive {
            token: token.to_string(),
        })
        .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.archives
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("No archive for token {}", token)))
    }
}
