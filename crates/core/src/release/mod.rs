//! Season and episode extraction from free-text release names.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::catalog::SubtitleCandidate;
use crate::media::MediaRequest;

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s(\d+)e(\d+)").expect("valid regex"));
static CROSS_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})x(\d{1,3})\b").expect("valid regex"));
static EPISODE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\be(\d+)\b").expect("valid regex"));

/// The episode a subtitle must belong to.
///
/// Zero is never a valid season or episode number here and is stored as
/// missing, so such a target never matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeTarget {
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl EpisodeTarget {
    pub fn new(season: u32, episode: u32) -> Self {
        Self {
            season: (season > 0).then_some(season),
            episode: (episode > 0).then_some(episode),
        }
    }

    /// Target for an episode request; `None` for movies.
    pub fn from_request(request: &MediaRequest) -> Option<Self> {
        request
            .season_episode()
            .map(|(season, episode)| Self::new(season, episode))
    }

    pub fn is_complete(&self) -> bool {
        self.season.is_some() && self.episode.is_some()
    }
}

fn capture_number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

/// Parses release names with an ordered set of patterns.
///
/// Precedence: `S01E02` (any case), then `1x02`, then a standalone `E02`
/// which yields the episode only. The last rule can be turned off.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseInfoParser {
    episode_only_fallback: bool,
}

impl Default for ReleaseInfoParser {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReleaseInfoParser {
    pub fn new(episode_only_fallback: bool) -> Self {
        Self {
            episode_only_fallback,
        }
    }

    /// Extract `(season, episode)` from a release string.
    pub fn extract_season_episode(&self, release_info: &str) -> (Option<u32>, Option<u32>) {
        if let Some(caps) = SEASON_EPISODE.captures(release_info) {
            return (capture_number(&caps, 1), capture_number(&caps, 2));
        }
        if let Some(caps) = CROSS_FORM.captures(release_info) {
            return (capture_number(&caps, 1), capture_number(&caps, 2));
        }
        if self.episode_only_fallback {
            if let Some(caps) = EPISODE_ONLY.captures(release_info) {
                return (None, capture_number(&caps, 1));
            }
        }
        (None, None)
    }

    /// Whether a release string belongs to the target episode.
    ///
    /// With both numbers extracted, both must equal the target. With only
    /// the episode extracted, the season is assumed from the surrounding
    /// season listing and only the episode is compared.
    pub fn matches_release(&self, release_info: &str, target: &EpisodeTarget) -> bool {
        let (Some(target_season), Some(target_episode)) = (target.season, target.episode) else {
            return false;
        };

        match self.extract_season_episode(release_info) {
            (Some(season), Some(episode)) => season == target_season && episode == target_episode,
            (None, Some(episode)) => episode == target_episode,
            _ => false,
        }
    }

    /// Whether a subtitle candidate belongs to the target episode.
    pub fn is_match(&self, candidate: &SubtitleCandidate, target: &EpisodeTarget) -> bool {
        self.matches_release(&candidate.release_info, target)
    }
}
