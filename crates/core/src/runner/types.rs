//! Runner types.

use serde::Serialize;
use thiserror::Error;

use crate::media::MediaType;
use crate::media_service::MediaServiceError;

/// Fatal run errors. Everything else is logged, recorded and skipped.
#[derive(Debug, Error)]
pub enum RunError {
    /// The wanted list of an enabled media type could not be fetched.
    #[error("Failed to list wanted {media_type}s: {source}")]
    WantedList {
        media_type: MediaType,
        #[source]
        source: MediaServiceError,
    },
}

/// Counters for one pass over the wanted lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub items_processed: usize,
    /// Subtitles fetched and extracted.
    pub downloaded: usize,
    /// Subtitles accepted by the media service.
    pub uploaded: usize,
    /// Languages skipped by the search throttle.
    pub skipped: usize,
    pub failed: usize,
    pub not_found: usize,
    /// Ledger subjects evicted at the start of the run.
    pub evicted: usize,
}

/// What happened to one (item, language) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LanguageOutcome {
    Skipped,
    NotFound,
    Failed,
    Downloaded { uploaded: bool },
}

impl RunSummary {
    pub(crate) fn add(&mut self, outcome: LanguageOutcome) {
        match outcome {
            LanguageOutcome::Skipped => self.skipped += 1,
            LanguageOutcome::NotFound => self.not_found += 1,
            LanguageOutcome::Failed => self.failed += 1,
            LanguageOutcome::Downloaded { uploaded } => {
                self.downloaded += 1;
                if uploaded {
                    self.uploaded += 1;
                }
            }
        }
    }
}
