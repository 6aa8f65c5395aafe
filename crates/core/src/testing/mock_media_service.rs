//! Mock media service for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::media::{normalize_subject_key, LanguageRequest, MediaRequest, MediaType};
use crate::media_service::{MediaService, MediaServiceError, PostProcessSettings, SyncOptions};

/// An upload received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub subject_key: String,
    pub language_code: String,
    pub forced: bool,
    pub hearing_impaired: bool,
    pub path: PathBuf,
    /// File contents at upload time.
    pub contents: Vec<u8>,
}

/// A sync or text cleanup request received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPostProcess {
    pub path: String,
    pub subject_key: String,
    pub language_code: String,
    /// Set for sync requests.
    pub sync: Option<SyncOptions>,
}

/// Mock implementation of the MediaService trait.
///
/// Provides controllable behavior for testing:
/// - Configurable wanted lists, cadences and years
/// - Uploads and post-processing requests recorded for assertions
/// - Simulated listing and upload failures
#[derive(Debug)]
pub struct MockMediaService {
    wanted: Arc<RwLock<HashMap<MediaType, Vec<MediaRequest>>>>,
    failing_lists: Arc<RwLock<HashSet<MediaType>>>,
    intervals: Arc<RwLock<HashMap<MediaType, Duration>>>,
    years: Arc<RwLock<HashMap<String, Option<i32>>>>,
    year_lookups: Arc<RwLock<Vec<String>>>,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    fail_uploads: Arc<RwLock<bool>>,
    settings: Arc<RwLock<PostProcessSettings>>,
    settings_requests: Arc<RwLock<usize>>,
    stored_paths: Arc<RwLock<HashMap<(String, String), String>>>,
    syncs: Arc<RwLock<Vec<RecordedPostProcess>>>,
    cleanups: Arc<RwLock<Vec<RecordedPostProcess>>>,
}

impl Default for MockMediaService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMediaService {
    /// Create a new mock with empty wanted lists.
    pub fn new() -> Self {
        Self {
            wanted: Arc::new(RwLock::new(HashMap::new())),
            failing_lists: Arc::new(RwLock::new(HashSet::new())),
            intervals: Arc::new(RwLock::new(HashMap::new())),
            years: Arc::new(RwLock::new(HashMap::new())),
            year_lookups: Arc::new(RwLock::new(Vec::new())),
            uploads: Arc::new(RwLock::new(Vec::new())),
            fail_uploads: Arc::new(RwLock::new(false)),
            settings: Arc::new(RwLock::new(PostProcessSettings::default())),
            settings_requests: Arc::new(RwLock::new(0)),
            stored_paths: Arc::new(RwLock::new(HashMap::new())),
            syncs: Arc::new(RwLock::new(Vec::new())),
            cleanups: Arc::new(RwLock::new(Vec::new())),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Set the wanted list for a media type.
    pub async fn set_wanted(&self, media_type: MediaType, items: Vec<MediaRequest>) {
        self.wanted.write().await.insert(media_type, items);
    }

    /// Make listing a media type fail.
    pub async fn fail_listing(&self, media_type: MediaType) {
        self.failing_lists.write().await.insert(media_type);
    }

    /// Set the search cadence reported for a media type. Unset types
    /// report the task as missing.
    pub async fn set_interval(&self, media_type: MediaType, interval: Duration) {
        self.intervals.write().await.insert(media_type, interval);
    }

    /// Set the year returned for a title lookup.
    pub async fn set_year(&self, title: &str, year: Option<i32>) {
        self.years
            .write()
            .await
            .insert(normalize_subject_key(title), year);
    }

    /// Make uploads fail (or succeed again).
    pub async fn set_fail_uploads(&self, fail: bool) {
        *self.fail_uploads.write().await = fail;
    }

    pub async fn set_post_process_settings(&self, settings: PostProcessSettings) {
        *self.settings.write().await = settings;
    }

    /// Set the stored subtitle path reported for an item and language code.
    pub async fn set_stored_path(&self, media: &MediaRequest, language_code: &str, path: &str) {
        self.stored_paths.write().await.insert(
            (media.subject_key(), language_code.to_string()),
            path.to_string(),
        );
    }

    // =========================================================================
    // Recorded Calls
    // =========================================================================

    pub async fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Titles passed to `lookup_year`, in order.
    pub async fn year_lookups(&self) -> Vec<String> {
        self.year_lookups.read().await.clone()
    }

    pub async fn settings_requests(&self) -> usize {
        *self.settings_requests.read().await
    }

    pub async fn sync_requests(&self) -> Vec<RecordedPostProcess> {
        self.syncs.read().await.clone()
    }

    pub async fn cleanup_requests(&self) -> Vec<RecordedPostProcess> {
        self.cleanups.read().await.clone()
    }
}

#[async_trait]
impl MediaService for MockMediaService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_missing_subtitles(
        &self,
        media_type: MediaType,
    ) -> Result<Vec<MediaRequest>, MediaServiceError> {
        if self.failing_lists.read().await.contains(&media_type) {
            return Err(MediaServiceError::ApiError {
                status: 500,
                message: format!("{} listing unavailable", media_type),
            });
        }
        Ok(self
            .wanted
            .read()
            .await
            .get(&media_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn research_interval(&self, media_type: MediaType) -> Result<Duration, MediaServiceError> {
        self.intervals
            .read()
            .await
            .get(&media_type)
            .copied()
            .ok_or_else(|| MediaServiceError::NotFound(format!("{} search task", media_type)))
    }

    async fn upload_subtitle(
        &self,
        media: &MediaRequest,
        path: &Path,
        language: &LanguageRequest,
    ) -> Result<(), MediaServiceError> {
        if *self.fail_uploads.read().await {
            return Err(MediaServiceError::ApiError {
                status: 500,
                message: "upload rejected".to_string(),
            });
        }

        let contents = tokio::fs::read(path).await?;
        self.uploads.write().await.push(RecordedUpload {
            subject_key: media.subject_key(),
            language_code: language.code.clone(),
            forced: language.forced,
            hearing_impaired: language.hearing_impaired,
            path: path.to_path_buf(),
            contents,
        });
        Ok(())
    }

    async fn lookup_year(&self, title: &str) -> Result<Option<i32>, MediaServiceError> {
        self.year_lookups.write().await.push(title.to_string());
        Ok(self
            .years
            .read()
            .await
            .get(&normalize_subject_key(title))
            .copied()
            .flatten())
    }

    async fn post_process_settings(&self) -> Result<PostProcessSettings, MediaServiceError> {
        *self.settings_requests.write().await += 1;
        Ok(self.settings.read().await.clone())
    }

    async fn stored_subtitle_path(
        &self,
        media: &MediaRequest,
        language: &LanguageRequest,
    ) -> Result<Option<String>, MediaServiceError> {
        Ok(self
            .stored_paths
            .read()
            .await
            .get(&(media.subject_key(), language.code.clone()))
            .cloned())
    }

    async fn trigger_sync(
        &self,
        path: &str,
        media: &MediaRequest,
        language: &LanguageRequest,
        options: &SyncOptions,
    ) -> Result<(), MediaServiceError> {
        self.syncs.write().await.push(RecordedPostProcess {
            path: path.to_string(),
            subject_key: media.subject_key(),
            language_code: language.code.clone(),
            sync: Some(options.clone()),
        });
        Ok(())
    }

    async fn trigger_text_cleanup(
        &self,
        path: &str,
        media: &MediaRequest,
        language: &LanguageRequest,
    ) -> Result<(), MediaServiceError> {
        self.cleanups.write().await.push(RecordedPostProcess {
            path: path.to_string(),
            subject_key: media.subject_key(),
            language_code: language.code.clone(),
            sync: None,
        });
        Ok(())
    }
}
