//! Subtitle catalog: title search, subtitle listings and archive downloads.

mod matcher;
mod subsource;
mod types;

pub use matcher::CatalogMatcher;
pub use subsource::SubSourceClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to a subtitle catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured correctly.
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

/// A remote subtitle catalog.
///
/// Implementations return canonical types whatever shape the remote
/// responses take.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Free-text title search. `include_series` widens the search to series.
    async fn search_title(
        &self,
        query: &str,
        include_series: bool,
    ) -> Result<Vec<CatalogCandidate>, CatalogError>;

    /// Subtitles in `language` under a movie or season locator.
    async fn list_subtitles(
        &self,
        locator: &str,
        language: &str,
    ) -> Result<Vec<SubtitleCandidate>, CatalogError>;

    /// Resolve the short-lived download token for a subtitle locator.
    ///
    /// `Ok(None)` means the catalog answered without a token.
    async fn resolve_download_token(
        &self,
        subtitle_locator: &str,
    ) -> Result<Option<String>, CatalogError>;

    /// Download the archive for a token.
    async fn download_archive(&self, token: &str) -> Result<DownloadedArchive, CatalogError>;
}
