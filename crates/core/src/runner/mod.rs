//! One sequential pass over the media service's wanted lists.
//!
//! Items and languages are handled one at a time: throttle check, catalog
//! search, fetch, upload, then bookkeeping in the ledger.

mod types;

pub use types::{RunError, RunSummary};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::{Config, RunConfig};
use crate::ledger::{Ledger, LedgerError};
use crate::media::{LanguageRequest, MediaKind, MediaRequest, MediaType};
use crate::media_service::{MediaService, PostProcessSettings};
use crate::retrieval::{RetrievalPipeline, SearchError};
use crate::throttle::SearchThrottle;

use types::LanguageOutcome;

/// Drives wanted media through the retrieval pipeline.
pub struct Runner<S: MediaService, C: Catalog> {
    service: Arc<S>,
    pipeline: RetrievalPipeline<C>,
    ledger: Ledger,
    run: RunConfig,
    language_delay: Duration,
    item_delay: Duration,
    /// Fetched on the first upload; `Some(None)` when the fetch failed.
    post_process: Option<Option<PostProcessSettings>>,
}

impl<S: MediaService, C: Catalog> Runner<S, C> {
    pub fn new(service: Arc<S>, catalog: Arc<C>, ledger: Ledger, config: &Config) -> Self {
        Self {
            service,
            pipeline: RetrievalPipeline::new(catalog, &config.retrieval),
            ledger,
            run: config.run.clone(),
            language_delay: config.retrieval.language_delay(),
            item_delay: config.retrieval.item_delay(),
            post_process: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn enabled_types(&self) -> Vec<MediaType> {
        let mut types = Vec::new();
        if self.run.movies_enabled {
            types.push(MediaType::Movie);
        }
        if self.run.episodes_enabled {
            types.push(MediaType::Episode);
        }
        types
    }

    /// Process every wanted item once.
    ///
    /// Only a failure to list wanted items is fatal. Ledger eviction uses the
    /// keys of every listed type, so it happens after all listings succeed.
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        let mut wanted = Vec::new();
        for media_type in self.enabled_types() {
            let items = self
                .service
                .list_missing_subtitles(media_type)
                .await
                .map_err(|source| RunError::WantedList { media_type, source })?;
            info!(media_type = %media_type, count = items.len(), "Wanted items");
            wanted.push((media_type, items));
        }

        let mut summary = RunSummary::default();
        let current_keys: Vec<String> = wanted
            .iter()
            .flat_map(|(_, items)| items.iter().map(MediaRequest::subject_key))
            .collect();
        summary.evicted = match self.ledger.evict_obsolete(&current_keys) {
            Ok(evicted) => evicted,
            Err(e) => {
                warn!(error = %e, "Failed to evict obsolete ledger entries");
                0
            }
        };

        let mut first = true;
        for (media_type, items) in &wanted {
            if items.is_empty() {
                continue;
            }
            let throttle = SearchThrottle::for_media_type(self.service.as_ref(), *media_type).await;
            info!(
                media_type = %media_type,
                items = items.len(),
                interval_hours = throttle.interval().as_secs_f64() / 3600.0,
                "Processing wanted items"
            );

            for item in items {
                if !first {
                    pause(self.item_delay).await;
                }
                first = false;

                self.process_item(item, &throttle, &mut summary).await;
                summary.items_processed += 1;
            }
        }

        let ledger = self.ledger.summary();
        info!(
            tracked_subjects = ledger.tracked_subjects,
            language_entries = ledger.language_entries,
            no_subtitles = ledger.searches_with_no_subtitles,
            successes = ledger.successful_downloads,
            failures = ledger.failed_downloads,
            "Ledger summary"
        );
        info!(
            items = summary.items_processed,
            downloaded = summary.downloaded,
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            not_found = summary.not_found,
            evicted = summary.evicted,
            "Run complete"
        );
        Ok(summary)
    }

    async fn process_item(
        &mut self,
        item: &MediaRequest,
        throttle: &SearchThrottle,
        summary: &mut RunSummary,
    ) {
        let mut request = item.clone();
        if let MediaKind::Movie { .. } = request.kind {
            request.year = self
                .pipeline
                .resolve_movie_year(self.service.as_ref(), &request.title, request.year)
                .await;
        }

        info!(media = %request.display_name(), languages = request.languages.len(), "Processing");

        for (index, language) in request.languages.iter().enumerate() {
            if index > 0 {
                pause(self.language_delay).await;
            }
            let outcome = self.process_language(&request, language, throttle).await;
            debug!(media = %request.display_name(), language = %language.code, outcome = ?outcome, "Language done");
            summary.add(outcome);
        }
    }

    async fn process_language(
        &mut self,
        request: &MediaRequest,
        language: &LanguageRequest,
        throttle: &SearchThrottle,
    ) -> LanguageOutcome {
        let key = request.subject_key();
        let lang = language.catalog_name();

        if throttle.should_skip(&self.ledger, &key, &lang) {
            info!(subject = %key, language = %lang, "Searched recently, skipping");
            return LanguageOutcome::Skipped;
        }
        log_ledger_error(self.ledger.record_search(&key, &lang));

        let candidates = match self.pipeline.search_request(request, &lang).await {
            Ok(candidates) => candidates,
            Err(SearchError::Catalog(e)) => {
                warn!(subject = %key, language = %lang, error = %e, "Catalog search failed");
                log_ledger_error(self.ledger.record_failure(&key, &lang, &e.to_string()));
                return LanguageOutcome::Failed;
            }
            Err(e) => {
                info!(subject = %key, language = %lang, reason = %e, "No catalog match");
                log_ledger_error(self.ledger.record_no_subtitles(&key, &lang));
                return LanguageOutcome::NotFound;
            }
        };

        let Some(candidate) = candidates.first() else {
            log_ledger_error(self.ledger.record_no_subtitles(&key, &lang));
            return LanguageOutcome::NotFound;
        };
        debug!(subject = %key, language = %lang, release = %candidate.release_info, "Fetching first candidate");

        let path = match self.pipeline.fetch(candidate).await {
            Ok(path) => path,
            Err(e) => {
                log_ledger_error(self.ledger.record_failure(&key, &lang, &e.to_string()));
                return LanguageOutcome::Failed;
            }
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        log_ledger_error(self.ledger.record_success(&key, &lang, &filename));

        let uploaded = match self.service.upload_subtitle(request, &path, language).await {
            Ok(()) => {
                log_ledger_error(self.ledger.remove_successful_entry(&key, &lang));
                if self.run.post_process {
                    self.post_process(request, language).await;
                }
                true
            }
            Err(e) => {
                warn!(subject = %key, language = %lang, error = %e, "Upload failed");
                false
            }
        };

        remove_local_file(&path).await;
        LanguageOutcome::Downloaded { uploaded }
    }

    async fn post_process_settings(&mut self) -> Option<PostProcessSettings> {
        if self.post_process.is_none() {
            let settings = match self.service.post_process_settings().await {
                Ok(settings) => Some(settings),
                Err(e) => {
                    warn!(error = %e, "Could not read post-processing settings");
                    None
                }
            };
            self.post_process = Some(settings);
        }
        self.post_process.clone().flatten()
    }

    async fn post_process(&mut self, request: &MediaRequest, language: &LanguageRequest) {
        let Some(settings) = self.post_process_settings().await else {
            return;
        };
        if !settings.sync.enabled && !settings.text_cleanup.enabled() {
            return;
        }

        let path = match self.service.stored_subtitle_path(request, language).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!(media = %request.display_name(), language = %language.code, "Stored subtitle not found, skipping post-processing");
                return;
            }
            Err(e) => {
                warn!(media = %request.display_name(), error = %e, "Could not locate stored subtitle");
                return;
            }
        };

        if settings.sync.enabled {
            if let Err(e) = self
                .service
                .trigger_sync(&path, request, language, &settings.sync)
                .await
            {
                warn!(path = %path, error = %e, "Subtitle sync failed");
            }
        }
        if settings.text_cleanup.enabled() {
            if let Err(e) = self.service.trigger_text_cleanup(&path, request, language).await {
                warn!(path = %path, error = %e, "Text cleanup failed");
            }
        }
    }
}

fn log_ledger_error<T>(result: Result<T, LedgerError>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to persist ledger");
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn remove_local_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Could not remove local subtitle");
    }
}
