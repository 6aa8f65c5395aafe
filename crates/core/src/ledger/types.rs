use serde::{Deserialize, Serialize};

/// Search history for one (subject, language) pair.
///
/// Timestamps are kept as the raw stored strings so a malformed value in the
/// document survives a load and can be reported where it is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_searched: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_no_subtitles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_download_success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_download_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl LedgerEntry {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    pub fn has_success(&self) -> bool {
        self.last_download_success.is_some()
    }

    /// Every stored timestamp that counts as a prior search attempt.
    pub fn attempt_timestamps(&self) -> impl Iterator<Item = &str> {
        [
            self.last_searched.as_deref(),
            self.last_no_subtitles.as_deref(),
            self.last_download_failure.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Aggregate counts over the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub tracked_subjects: usize,
    pub language_entries: usize,
    pub searches_with_no_subtitles: usize,
    pub successful_downloads: usize,
    pub failed_downloads: usize,
}
