//! Catalog search and the token, download and extract fetch sequence.
//!
//! Every catalog call is followed by a fixed pause so repeated runs stay
//! under the catalog's informal rate limit. Nothing here retries; a failed
//! step ends the attempt and the next scheduled run decides whether to try
//! again.

mod archive;
mod years;

pub use archive::{extract_subtitle, is_subtitle_name, ArchiveError, SUBTITLE_EXTENSIONS};
pub use years::YearCache;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogError, CatalogMatcher, SubtitleCandidate};
use crate::config::RetrievalConfig;
use crate::media::{MediaKind, MediaRequest};
use crate::media_service::MediaService;
use crate::release::{EpisodeTarget, ReleaseInfoParser};

/// Years at or below this are treated as unknown.
const MIN_PLAUSIBLE_YEAR: i32 = 1900;

/// Why a search produced no candidates.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Catalog request failed: {0}")]
    Catalog(#[from] CatalogError),

    /// No catalog entry matched the title.
    #[error("No catalog entry for '{0}'")]
    NoCatalogMatch(String),

    /// The series matched but none of its seasons did.
    #[error("No season {season} for '{title}'")]
    NoSeason { title: String, season: u32 },

    /// The selected entry has no locator to list subtitles with.
    #[error("Catalog entry '{0}' has no locator")]
    MissingLocator(String),
}

/// Why a fetch produced no file.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Catalog request failed: {0}")]
    Catalog(#[from] CatalogError),

    /// The subtitle detail carried no download token.
    #[error("No download token for subtitle {0}")]
    MissingToken(String),

    /// An HTML page came back in place of the archive.
    #[error("Download returned an HTML page instead of an archive")]
    HtmlResponse,

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The extraction task did not complete.
    #[error("Extraction task failed: {0}")]
    Extraction(String),
}

/// Searches the catalog and fetches subtitle files for media requests.
pub struct RetrievalPipeline<C: Catalog> {
    catalog: Arc<C>,
    matcher: CatalogMatcher,
    parser: ReleaseInfoParser,
    download_dir: PathBuf,
    request_delay: Duration,
    years: YearCache,
}

impl<C: Catalog> RetrievalPipeline<C> {
    pub fn new(catalog: Arc<C>, config: &RetrievalConfig) -> Self {
        Self {
            catalog,
            matcher: CatalogMatcher::new(),
            parser: ReleaseInfoParser::new(config.episode_only_fallback),
            download_dir: config.download_dir.clone(),
            request_delay: config.request_delay(),
            years: YearCache::new(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn year_cache(&self) -> &YearCache {
        &self.years
    }

    async fn pace(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// Subtitle candidates for a movie title.
    ///
    /// Prefers the search result whose release year equals `year`, else the
    /// first result.
    pub async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        language: &str,
    ) -> Result<Vec<SubtitleCandidate>, SearchError> {
        let results = self.catalog.search_title(title, false).await;
        self.pace().await;
        let results = results?;

        let movie = self
            .matcher
            .select_movie(&results, year)
            .ok_or_else(|| SearchError::NoCatalogMatch(title.to_string()))?;
        if movie.locator.is_empty() {
            return Err(SearchError::MissingLocator(movie.title.clone()));
        }
        debug!(title = %title, matched = %movie.title, year = ?movie.release_year, "Selected movie entry");

        let subtitles = self.catalog.list_subtitles(&movie.locator, language).await;
        self.pace().await;
        let subtitles = subtitles?;

        info!(title = %title, language = %language, count = subtitles.len(), "Movie subtitles found");
        Ok(subtitles)
    }

    /// Subtitle candidates for one episode, filtered to release names that
    /// name the same episode.
    ///
    /// A movie request is searched as a movie.
    pub async fn search_episode(
        &self,
        request: &MediaRequest,
        language: &str,
    ) -> Result<Vec<SubtitleCandidate>, SearchError> {
        let Some((season, episode)) = request.season_episode() else {
            return self.search(&request.title, request.year, language).await;
        };

        let results = self.catalog.search_title(&request.title, true).await;
        self.pace().await;
        let results = results?;

        let series = self
            .matcher
            .select_series(&results, &request.title, request.year, season)
            .ok_or_else(|| SearchError::NoCatalogMatch(request.title.clone()))?;
        let locator = self
            .matcher
            .select_season(series, season)
            .ok_or_else(|| SearchError::NoSeason {
                title: series.title.clone(),
                season,
            })?;
        debug!(title = %request.title, matched = %series.title, season, locator = %locator, "Selected season");

        let listing = self.catalog.list_subtitles(&locator, language).await;
        self.pace().await;
        let listing = listing?;

        let target = EpisodeTarget::new(season, episode);
        let total = listing.len();
        let matching: Vec<SubtitleCandidate> = listing
            .into_iter()
            .filter(|candidate| self.parser.is_match(candidate, &target))
            .collect();

        info!(
            media = %request.display_name(),
            language = %language,
            listed = total,
            matching = matching.len(),
            "Episode subtitles found"
        );
        Ok(matching)
    }

    /// Search by request kind.
    pub async fn search_request(
        &self,
        request: &MediaRequest,
        language: &str,
    ) -> Result<Vec<SubtitleCandidate>, SearchError> {
        match request.kind {
            MediaKind::Movie { .. } => self.search(&request.title, request.year, language).await,
            MediaKind::Episode { .. } => self.search_episode(request, language).await,
        }
    }

    /// Resolve the token, download the archive and extract its subtitle into
    /// the download directory. The temporary archive is always removed.
    pub async fn fetch(&self, candidate: &SubtitleCandidate) -> Result<PathBuf, FetchError> {
        let token = self.catalog.resolve_download_token(&candidate.locator).await;
        self.pace().await;
        let token = token?.ok_or_else(|| FetchError::MissingToken(candidate.id.clone()))?;

        let archive = self.catalog.download_archive(&token).await;
        self.pace().await;
        let archive = archive?;
        if archive.is_html() {
            warn!(subtitle = %candidate.id, "Catalog returned an HTML page for the download");
            return Err(FetchError::HtmlResponse);
        }

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let archive_path = self.download_dir.join(temp_archive_name(&candidate.id));
        let result = self.extract(&archive_path, archive.bytes).await;

        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %archive_path.display(), error = %e, "Could not remove temporary archive");
            }
        }

        match &result {
            Ok(path) => info!(subtitle = %candidate.id, path = %path.display(), "Subtitle extracted"),
            Err(e) => warn!(subtitle = %candidate.id, error = %e, "Subtitle fetch failed"),
        }
        result
    }

    async fn extract(&self, archive_path: &Path, bytes: Vec<u8>) -> Result<PathBuf, FetchError> {
        tokio::fs::write(archive_path, bytes).await?;

        let archive_path = archive_path.to_owned();
        let target_dir = self.download_dir.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extract_subtitle(&archive_path, &target_dir))
                .await
                .map_err(|e| FetchError::Extraction(e.to_string()))?;
        Ok(extracted?)
    }

    /// A usable release year for a movie.
    ///
    /// A reported year above 1900 is trusted. Otherwise the media service is
    /// asked once per title; lookup failures count as unknown.
    pub async fn resolve_movie_year<S>(
        &mut self,
        service: &S,
        title: &str,
        reported: Option<i32>,
    ) -> Option<i32>
    where
        S: MediaService + ?Sized,
    {
        if let Some(year) = reported.filter(|y| *y > MIN_PLAUSIBLE_YEAR) {
            return Some(year);
        }
        if let Some(cached) = self.years.get(title) {
            return cached;
        }

        let year = match service.lookup_year(title).await {
            Ok(year) => year.filter(|y| *y > MIN_PLAUSIBLE_YEAR),
            Err(e) => {
                warn!(title = %title, error = %e, "Year lookup failed");
                None
            }
        };
        debug!(title = %title, year = ?year, "Resolved movie year");
        self.years.insert(title, year);
        year
    }
}

/// File name for a downloaded archive, with path separators removed from the id.
fn temp_archive_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("temp_{}.zip", safe)
}
