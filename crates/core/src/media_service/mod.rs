//! The subtitle-management service that reports missing subtitles and
//! accepts uploads.

mod bazarr;

pub use bazarr::BazarrClient;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{LanguageRequest, MediaRequest, MediaType};
use crate::throttle::CadenceParseError;

/// Errors that can occur when talking to the media service.
#[derive(Debug, Error)]
pub enum MediaServiceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Credentials rejected.
    #[error("Unauthorized: check the API key and basic auth credentials")]
    Unauthorized,

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Expected data was absent from the response.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The reported cadence could not be parsed.
    #[error("Invalid search cadence: {0}")]
    Cadence(#[from] CadenceParseError),

    /// Local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client not configured correctly.
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

/// Synchronization options, as configured on the media service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub enabled: bool,
    pub max_offset_seconds: u32,
    pub no_fix_framerate: bool,
    pub use_gss: bool,
    /// Stream used as the timing reference, e.g. `a:0` for the first audio track.
    pub reference: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_offset_seconds: 300,
            no_fix_framerate: false,
            use_gss: false,
            reference: "a:0".to_string(),
        }
    }
}

/// Text cleanup modifications enabled on the media service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCleanupSettings {
    pub mods: Vec<String>,
}

impl TextCleanupSettings {
    pub fn enabled(&self) -> bool {
        !self.mods.is_empty()
    }
}

/// Post-processing the media service applies to uploaded subtitles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessSettings {
    pub sync: SyncOptions,
    pub text_cleanup: TextCleanupSettings,
}

/// Subtitle-management backend.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Media items of one type that are missing at least one subtitle.
    async fn list_missing_subtitles(
        &self,
        media_type: MediaType,
    ) -> Result<Vec<MediaRequest>, MediaServiceError>;

    /// The service's own re-search cadence for one media type.
    async fn research_interval(&self, media_type: MediaType) -> Result<Duration, MediaServiceError>;

    /// Upload a subtitle file for one language of a media item.
    async fn upload_subtitle(
        &self,
        media: &MediaRequest,
        path: &Path,
        language: &LanguageRequest,
    ) -> Result<(), MediaServiceError>;

    /// Release year for a movie title, when the service knows it.
    async fn lookup_year(&self, title: &str) -> Result<Option<i32>, MediaServiceError>;

    /// Sync and text cleanup settings.
    async fn post_process_settings(&self) -> Result<PostProcessSettings, MediaServiceError>;

    /// Server-side path of the stored subtitle for one language.
    async fn stored_subtitle_path(
        &self,
        media: &MediaRequest,
        language: &LanguageRequest,
    ) -> Result<Option<String>, MediaServiceError>;

    /// Ask the service to synchronize a stored subtitle.
    async fn trigger_sync(
        &self,
        path: &str,
        media: &MediaRequest,
        language: &LanguageRequest,
        options: &SyncOptions,
    ) -> Result<(), MediaServiceError>;

    /// Ask the service to apply its text cleanup to a stored subtitle.
    async fn trigger_text_cleanup(
        &self,
        path: &str,
        media: &MediaRequest,
        language: &LanguageRequest,
    ) -> Result<(), MediaServiceError>;
}
