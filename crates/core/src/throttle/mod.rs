//! Skip decisions for searches that were attempted recently.

mod cadence;

pub use cadence::{parse_cadence, CadenceParseError};

use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::ledger::{parse_timestamp, Ledger};
use crate::media::MediaType;
use crate::media_service::MediaService;

/// Interval used when the media service cannot report its own cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Decides whether a (subject, language) search should be skipped.
#[derive(Debug, Clone, Copy)]
pub struct SearchThrottle {
    interval: Duration,
}

impl Default for SearchThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl SearchThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Build a throttle from an interval expressed in hours.
    pub fn from_hours(hours: f64) -> Self {
        Self::new(Duration::from_secs_f64(hours.max(0.0) * 3600.0))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Query the media service for its re-search cadence, falling back to
    /// [`DEFAULT_INTERVAL`] on any error.
    pub async fn for_media_type<S>(service: &S, media_type: MediaType) -> Self
    where
        S: MediaService + ?Sized,
    {
        match service.research_interval(media_type).await {
            Ok(interval) => {
                debug!(media_type = %media_type, interval_secs = interval.as_secs(), "Using media service search cadence");
                Self::new(interval)
            }
            Err(e) => {
                warn!(media_type = %media_type, error = %e, "Could not determine search cadence, using 24 hours");
                Self::default()
            }
        }
    }

    /// Whether a search for (subject, language) should be skipped now.
    pub fn should_skip(&self, ledger: &Ledger, subject_key: &str, language: &str) -> bool {
        self.should_skip_at(ledger, subject_key, language, Local::now())
    }

    /// Same as [`should_skip`](Self::should_skip), evaluated at `now`.
    ///
    /// A recorded success always clears the skip. Otherwise the latest
    /// search, no-result or failure timestamp is compared against the
    /// interval. Malformed timestamps count as no record.
    pub fn should_skip_at(
        &self,
        ledger: &Ledger,
        subject_key: &str,
        language: &str,
        now: DateTime<Local>,
    ) -> bool {
        let Some(entry) = ledger.entry(subject_key, language) else {
            return false;
        };

        if entry.has_success() {
            return false;
        }

        let mut last_attempt: Option<DateTime<Local>> = None;
        for raw in entry.attempt_timestamps() {
            match parse_timestamp(raw) {
                Some(ts) => {
                    if last_attempt.is_none_or(|current| ts > current) {
                        last_attempt = Some(ts);
                    }
                }
                None => {
                    warn!(subject = %subject_key, language = %language, timestamp = %raw, "Invalid timestamp in ledger, ignoring");
                }
            }
        }

        let Some(last_attempt) = last_attempt else {
            return false;
        };

        let elapsed = now.signed_duration_since(last_attempt);
        let skip = match elapsed.to_std() {
            Ok(elapsed) => elapsed < self.interval,
            // Timestamp in the future: the attempt is as recent as it gets.
            Err(_) => !self.interval.is_zero(),
        };

        if skip {
            debug!(
                subject = %subject_key,
                language = %language,
                elapsed_secs = elapsed.num_seconds(),
                "Skipping search, last attempt within cadence"
            );
        }
        skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_with(doc: serde_json::Value) -> (Ledger, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, doc.to_string()).unwrap();
        (Ledger::open(&path).unwrap(), dir)
    }

    fn stamp(at: DateTime<Local>) -> String {
        at.to_rfc3339()
    }

    #[test]
    fn test_no_entry_never_skips() {
        let (ledger, _dir) = ledger_with(serde_json::json!({}));
        assert!(!SearchThrottle::default().should_skip(&ledger, "heat", "english"));
    }

    #[test]
    fn test_failure_one_hour_ago() {
        let now = Local::now();
        let (ledger, _dir) = ledger_with(serde_json::json!({
            "heat": [{
                "language": "english",
                "last_download_failure": stamp(now - chrono::Duration::hours(1)),
                "last_error": "boom"
            }]
        }));

        assert!(SearchThrottle::from_hours(2.0).should_skip_at(&ledger, "Heat", "english", now));
        assert!(!SearchThrottle::from_hours(0.5).should_skip_at(&ledger, "Heat", "english", now));
    }

    #[test]
    fn test_no_subtitles_record_uses_latest_timestamp() {
        let now = Local::now();
        let (ledger, _dir) = ledger_with(serde_json::json!({
            "heat": [{
                "language": "english",
                "last_searched": stamp(now - chrono::Duration::hours(30)),
                "last_no_subtitles": stamp(now - chrono::Duration::hours(3))
            }]
        }));

        assert!(SearchThrottle::from_hours(24.0).should_skip_at(&ledger, "heat", "english", now));
        assert!(!SearchThrottle::from_hours(2.0).should_skip_at(&ledger, "heat", "english", now));
    }

    #[test]
    fn test_success_always_clears_skip() {
        let now = Local::now();
        for age in [chrono::Duration::minutes(1), chrono::Duration::days(30)] {
            let (ledger, _dir) = ledger_with(serde_json::json!({
                "heat": [{
                    "language": "english",
                    "last_no_subtitles": stamp(now - chrono::Duration::minutes(5)),
                    "last_download_success": stamp(now - age),
                    "downloaded_filename": "heat.srt"
                }]
            }));
            assert!(!SearchThrottle::from_hours(24.0).should_skip_at(&ledger, "heat", "english", now));
        }
    }

    #[test]
    fn test_malformed_timestamp_is_no_record() {
        let (ledger, _dir) = ledger_with(serde_json::json!({
            "heat": [{ "language": "english", "last_no_subtitles": "not a date" }]
        }));
        assert!(!SearchThrottle::from_hours(24.0).should_skip(&ledger, "heat", "english"));
    }

    #[test]
    fn test_legacy_naive_timestamp() {
        let now = Local::now();
        let naive = (now - chrono::Duration::hours(1))
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        let (ledger, _dir) = ledger_with(serde_json::json!({
            "heat": [{ "language": "english", "last_no_subtitles": naive }]
        }));
        assert!(SearchThrottle::from_hours(2.0).should_skip_at(&ledger, "heat", "english", now));
    }

    #[test]
    fn test_other_language_is_independent() {
        let now = Local::now();
        let (ledger, _dir) = ledger_with(serde_json::json!({
            "heat": [{ "language": "english", "last_no_subtitles": stamp(now) }]
        }));
        assert!(!SearchThrottle::default().should_skip_at(&ledger, "heat", "french", now));
    }

    #[tokio::test]
    async fn test_interval_from_media_service_or_default() {
        use crate::testing::MockMediaService;

        let service = MockMediaService::new();
        service
            .set_interval(MediaType::Movie, Duration::from_secs(6 * 3600))
            .await;

        let movies = SearchThrottle::for_media_type(&service, MediaType::Movie).await;
        assert_eq!(movies.interval(), Duration::from_secs(6 * 3600));

        let episodes = SearchThrottle::for_media_type(&service, MediaType::Episode).await;
        assert_eq!(episodes.interval(), DEFAULT_INTERVAL);
    }
}
