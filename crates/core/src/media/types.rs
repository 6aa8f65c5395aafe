use serde::{Deserialize, Serialize};

use super::normalize_subject_key;

/// Media type as understood by the media service's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Episode,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Episode => "episode",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific identity of a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    Movie {
        /// Radarr identifier used for uploads.
        movie_id: i64,
    },
    Episode {
        /// Sonarr series identifier.
        series_id: i64,
        /// Sonarr episode identifier.
        episode_id: i64,
        season: u32,
        episode: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        episode_title: Option<String>,
    },
}

/// One missing subtitle variant for a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRequest {
    /// Human readable language name, e.g. "English".
    pub name: String,
    /// ISO 639-1 code, e.g. "en".
    pub code: String,
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub hearing_impaired: bool,
}

impl LanguageRequest {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            forced: false,
            hearing_impaired: false,
        }
    }

    /// Language name as the catalog and the ledger expect it ("english").
    pub fn catalog_name(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// One unit of work: a movie or episode with its missing languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    /// Movie title, or series title for episodes.
    pub title: String,
    /// Release year (series year for episodes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub kind: MediaKind,
    #[serde(default)]
    pub languages: Vec<LanguageRequest>,
}

impl MediaRequest {
    pub fn movie(title: impl Into<String>, year: Option<i32>, movie_id: i64) -> Self {
        Self {
            title: title.into(),
            year,
            kind: MediaKind::Movie { movie_id },
            languages: Vec::new(),
        }
    }

    pub fn episode(
        series_title: impl Into<String>,
        year: Option<i32>,
        series_id: i64,
        episode_id: i64,
        season: u32,
        episode: u32,
    ) -> Self {
        Self {
            title: series_title.into(),
            year,
            kind: MediaKind::Episode {
                series_id,
                episode_id,
                season,
                episode,
                episode_title: None,
            },
            languages: Vec::new(),
        }
    }

    /// Set the episode title; ignored for movies.
    pub fn with_episode_title(mut self, title: impl Into<String>) -> Self {
        if let MediaKind::Episode { episode_title, .. } = &mut self.kind {
            *episode_title = Some(title.into());
        }
        self
    }

    pub fn with_language(mut self, language: LanguageRequest) -> Self {
        self.languages.push(language);
        self
    }

    pub fn media_type(&self) -> MediaType {
        match self.kind {
            MediaKind::Movie { .. } => MediaType::Movie,
            MediaKind::Episode { .. } => MediaType::Episode,
        }
    }

    /// Season and episode numbers, for episodes only.
    pub fn season_episode(&self) -> Option<(u32, u32)> {
        match self.kind {
            MediaKind::Episode {
                season, episode, ..
            } => Some((season, episode)),
            MediaKind::Movie { .. } => None,
        }
    }

    /// Ledger key: the normalized title, or `title:SxxEyy` for episodes.
    pub fn subject_key(&self) -> String {
        match self.kind {
            MediaKind::Movie { .. } => normalize_subject_key(&self.title),
            MediaKind::Episode {
                season, episode, ..
            } => normalize_subject_key(&format!(
                "{}:S{:02}E{:02}",
                self.title, season, episode
            )),
        }
    }

    /// Short label for logs.
    pub fn display_name(&self) -> String {
        match (&self.kind, self.year) {
            (
                MediaKind::Episode {
                    season,
                    episode,
                    episode_title: Some(name),
                    ..
                },
                _,
            ) => format!("{} S{:02}E{:02} - {}", self.title, season, episode, name),
            (MediaKind::Episode { season, episode, .. }, _) => {
                format!("{} S{:02}E{:02}", self.title, season, episode)
            }
            (MediaKind::Movie { .. }, Some(year)) => format!("{} ({})", self.title, year),
            (MediaKind::Movie { .. }, None) => self.title.clone(),
        }
    }
}
