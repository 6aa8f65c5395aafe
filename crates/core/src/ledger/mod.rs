//! Persisted search history, keyed by normalized subject and language.
//!
//! The whole document is loaded when the ledger is opened and rewritten in
//! full after every mutation. A single process is expected to own the file.

mod types;

pub use types::*;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::media::normalize_subject_key;

/// Errors that can occur while persisting the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 as well as offset-less ISO 8601 (read as local time),
/// which is what older ledger files contain.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

fn now_stamp() -> String {
    Local::now().to_rfc3339()
}

fn normalize_language(language: &str) -> String {
    language.trim().to_lowercase()
}

/// Search history store.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    subjects: BTreeMap<String, Vec<LedgerEntry>>,
}

impl Ledger {
    /// Open the ledger at `path`, loading whatever is already there.
    ///
    /// A missing file yields an empty ledger. A file that is not a valid
    /// ledger document is logged and replaced by an empty ledger on the next
    /// write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        let subjects = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(subjects) => subjects,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ledger file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(LedgerError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        let ledger = Self { path, subjects };
        debug!(
            path = %ledger.path.display(),
            subjects = ledger.subjects.len(),
            "Loaded ledger"
        );
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of tracked subjects.
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subject_keys(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }

    /// All language entries stored for a subject.
    pub fn entries(&self, subject_key: &str) -> &[LedgerEntry] {
        self.subjects
            .get(&normalize_subject_key(subject_key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The entry for one (subject, language) pair.
    pub fn entry(&self, subject_key: &str, language: &str) -> Option<&LedgerEntry> {
        let language = normalize_language(language);
        self.entries(subject_key)
            .iter()
            .find(|e| e.language == language)
    }

    /// Record that a search was attempted.
    pub fn record_search(&mut self, subject_key: &str, language: &str) -> Result<(), LedgerError> {
        let stamp = now_stamp();
        self.update(subject_key, language, |entry| {
            entry.last_searched = Some(stamp);
        })
    }

    /// Record a search that found no usable subtitle.
    pub fn record_no_subtitles(
        &mut self,
        subject_key: &str,
        language: &str,
    ) -> Result<(), LedgerError> {
        let stamp = now_stamp();
        info!(subject = %subject_key, language = %language, "Recorded no subtitles found");
        self.update(subject_key, language, |entry| {
            entry.last_searched = Some(stamp.clone());
            entry.last_no_subtitles = Some(stamp);
        })
    }

    /// Record a failed retrieval with its error text.
    pub fn record_failure(
        &mut self,
        subject_key: &str,
        language: &str,
        error: &str,
    ) -> Result<(), LedgerError> {
        let stamp = now_stamp();
        info!(subject = %subject_key, language = %language, error = %error, "Recorded download failure");
        self.update(subject_key, language, |entry| {
            entry.last_searched = Some(stamp.clone());
            entry.last_download_failure = Some(stamp);
            entry.last_error = Some(error.to_string());
        })
    }

    /// Record a successful retrieval.
    pub fn record_success(
        &mut self,
        subject_key: &str,
        language: &str,
        filename: &str,
    ) -> Result<(), LedgerError> {
        let stamp = now_stamp();
        info!(subject = %subject_key, language = %language, filename = %filename, "Recorded download success");
        self.update(subject_key, language, |entry| {
            entry.last_searched = Some(stamp.clone());
            entry.last_download_success = Some(stamp);
            entry.downloaded_filename = Some(filename.to_string());
        })
    }

    /// Drop the entry for a completed (subject, language) pair.
    ///
    /// Returns whether an entry was removed. A subject left without entries
    /// is removed as well.
    pub fn remove_successful_entry(
        &mut self,
        subject_key: &str,
        language: &str,
    ) -> Result<bool, LedgerError> {
        let key = normalize_subject_key(subject_key);
        let language = normalize_language(language);

        let Some(entries) = self.subjects.get_mut(&key) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|e| e.language != language);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.subjects.remove(&key);
        }

        if removed {
            debug!(subject = %key, language = %language, "Removed completed ledger entry");
            self.persist()?;
        }
        Ok(removed)
    }

    /// Remove every subject absent from `current_keys`. Returns how many were removed.
    pub fn evict_obsolete<I, S>(&mut self, current_keys: I) -> Result<usize, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keep: HashSet<String> = current_keys
            .into_iter()
            .map(|k| normalize_subject_key(k.as_ref()))
            .collect();

        let before = self.subjects.len();
        self.subjects.retain(|key, _| keep.contains(key));
        let removed = before - self.subjects.len();

        if removed > 0 {
            info!(removed, "Evicted obsolete ledger subjects");
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary {
            tracked_subjects: self.subjects.len(),
            ..Default::default()
        };
        for entry in self.subjects.values().flatten() {
            summary.language_entries += 1;
            if entry.last_no_subtitles.is_some() && !entry.has_success() {
                summary.searches_with_no_subtitles += 1;
            }
            if entry.has_success() {
                summary.successful_downloads += 1;
            }
            if entry.last_download_failure.is_some() {
                summary.failed_downloads += 1;
            }
        }
        summary
    }

    fn update<F>(&mut self, subject_key: &str, language: &str, apply: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut LedgerEntry),
    {
        let key = normalize_subject_key(subject_key);
        let language = normalize_language(language);

        let entries = self.subjects.entry(key).or_default();
        let position = match entries.iter().position(|e| e.language == language) {
            Some(position) => position,
            None => {
                entries.push(LedgerEntry::new(language));
                entries.len() - 1
            }
        };
        apply(&mut entries[position]);

        self.persist()
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.subjects)?;
        std::fs::write(&self.path, json).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (Ledger, TempDir) {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::open(dir.path().join("ledger.json")).unwrap();
        (ledger, dir)
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let (ledger, _dir) = open_temp();
        assert!(ledger.is_empty());
        assert_eq!(ledger.summary(), LedgerSummary::default());
    }

    #[test]
    fn test_open_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut ledger = Ledger::open(&path).unwrap();
        assert!(ledger.is_empty());

        ledger.record_search("Heat", "english").unwrap();
        let reloaded = Ledger::open(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_record_failure_twice_keeps_one_entry() {
        let (mut ledger, _dir) = open_temp();

        ledger.record_failure("Heat", "english", "first").unwrap();
        let first = ledger.entry("Heat", "english").unwrap().clone();
        ledger.record_failure("Heat", "english", "second").unwrap();

        let entries = ledger.entries("heat");
        assert_eq!(entries.len(), 1);
        let second = &entries[0];
        assert_eq!(second.last_error.as_deref(), Some("second"));

        let t1 = parse_timestamp(first.last_download_failure.as_deref().unwrap()).unwrap();
        let t2 = parse_timestamp(second.last_download_failure.as_deref().unwrap()).unwrap();
        assert!(t2 >= t1);
    }

    #[test]
    fn test_languages_are_separate_entries() {
        let (mut ledger, _dir) = open_temp();
        ledger.record_no_subtitles("Heat", "english").unwrap();
        ledger.record_no_subtitles("Heat", "French").unwrap();

        assert_eq!(ledger.entries("Heat").len(), 2);
        assert!(ledger.entry("heat", "french").is_some());
    }

    #[test]
    fn test_mutations_persist_full_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        {
            let mut ledger = Ledger::open(&path).unwrap();
            ledger.record_success("The Matrix", "english", "matrix.srt").unwrap();
            ledger.record_no_subtitles("Heat", "english").unwrap();
        }

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let matrix = &raw["the matrix"][0];
        assert_eq!(matrix["language"], "english");
        assert_eq!(matrix["downloaded_filename"], "matrix.srt");
        assert!(matrix.get("last_error").is_none());
        assert!(raw["heat"][0]["last_no_subtitles"].is_string());
    }

    #[test]
    fn test_subject_keys_are_normalized() {
        let (mut ledger, _dir) = open_temp();
        ledger.record_search("  The   Matrix  ", "english").unwrap();
        ledger.record_search("the matrix", "english").unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.subject_keys().collect::<Vec<_>>(), vec!["the matrix"]);
    }

    #[test]
    fn test_evict_obsolete_removes_absent_subjects() {
        let (mut ledger, _dir) = open_temp();
        ledger.record_search("Movie A", "english").unwrap();
        ledger.record_search("Movie B", "english").unwrap();

        let removed = ledger.evict_obsolete(["Movie A"]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(ledger.subject_keys().collect::<Vec<_>>(), vec!["movie a"]);
    }

    #[test]
    fn test_remove_successful_entry() {
        let (mut ledger, _dir) = open_temp();
        ledger.record_success("Heat", "english", "heat.srt").unwrap();
        ledger.record_no_subtitles("Heat", "french").unwrap();

        assert!(ledger.remove_successful_entry("Heat", "english").unwrap());
        assert!(!ledger.remove_successful_entry("Heat", "english").unwrap());
        assert_eq!(ledger.entries("Heat").len(), 1);

        assert!(ledger.remove_successful_entry("Heat", "french").unwrap());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let (mut ledger, _dir) = open_temp();
        ledger.record_no_subtitles("A", "english").unwrap();
        ledger.record_failure("B", "english", "boom").unwrap();
        ledger.record_success("C", "english", "c.srt").unwrap();
        ledger.record_success("C", "french", "c.fr.srt").unwrap();

        let summary = ledger.summary();
        assert_eq!(summary.tracked_subjects, 3);
        assert_eq!(summary.language_entries, 4);
        assert_eq!(summary.searches_with_no_subtitles, 1);
        assert_eq!(summary.failed_downloads, 1);
        assert_eq!(summary.successful_downloads, 2);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-05-01T10:20:30.123456").is_some());
        assert!(parse_timestamp("2024-05-01T10:20:30").is_some());
        assert!(parse_timestamp("2024-05-01T10:20:30+02:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_loads_legacy_document_with_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(
            &path,
            r#"{"heat": [{"language": "english", "last_searched": "2024-01-01T00:00:00", "subtitles_found": 3}]}"#,
        )
        .unwrap();

        let ledger = Ledger::open(&path).unwrap();
        let entry = ledger.entry("Heat", "english").unwrap();
        assert_eq!(entry.last_searched.as_deref(), Some("2024-01-01T00:00:00"));
    }
}
