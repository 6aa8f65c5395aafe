//! Disambiguation of catalog search results.
//!
//! Catalog data mixes movies, specials and series, and season numbering is
//! not always reliable, so every rule degrades to a usable fallback before
//! giving up.

use tracing::debug;

use super::{CatalogCandidate, SeasonEntry};

/// Picks one catalog entry (and season) for a target.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogMatcher;

impl CatalogMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Pick the series entry for `title`.
    ///
    /// Only series whose title contains the target title (case-insensitive)
    /// are considered. Among several, an exact release-year match wins, then
    /// an entry listing the target season, then the first candidate.
    pub fn select_series<'a>(
        &self,
        candidates: &'a [CatalogCandidate],
        title: &str,
        year: Option<i32>,
        season: u32,
    ) -> Option<&'a CatalogCandidate> {
        let needle = title.to_lowercase();
        let series: Vec<&CatalogCandidate> = candidates
            .iter()
            .filter(|c| c.is_series() && c.title.to_lowercase().contains(&needle))
            .collect();

        debug!(title = %title, candidates = series.len(), "Series candidates after title filter");

        match series.as_slice() {
            [] => return None,
            [only] => return Some(*only),
            _ => {}
        }

        if let Some(year) = year {
            let by_year: Vec<&CatalogCandidate> = series
                .iter()
                .copied()
                .filter(|c| c.release_year == Some(year))
                .collect();

            match by_year.as_slice() {
                [] => {}
                [only] => return Some(*only),
                [first, ..] => {
                    return Some(
                        by_year
                            .iter()
                            .copied()
                            .find(|c| self.has_season(c, season))
                            .unwrap_or(*first),
                    );
                }
            }
        }

        series
            .iter()
            .copied()
            .find(|c| self.has_season(c, season))
            .or_else(|| series.first().copied())
    }

    /// Pick the season locator for `season` within a series.
    ///
    /// Exact season number first, then the only listed season, then a
    /// season released within one year of the series. The returned locator
    /// has every `=` rewritten to `-`.
    pub fn select_season(&self, series: &CatalogCandidate, season: u32) -> Option<String> {
        let usable = |entry: &SeasonEntry| (!entry.locator.is_empty()).then(|| slug(&entry.locator));

        if let Some(locator) = series
            .seasons
            .iter()
            .filter(|s| s.season == season)
            .find_map(usable)
        {
            return Some(locator);
        }

        if let [only] = series.seasons.as_slice() {
            debug!(
                requested = season,
                available = only.season,
                "Using the only listed season"
            );
            return usable(only);
        }

        let series_year = series.release_year?;
        series
            .seasons
            .iter()
            .filter(|s| {
                s.release_year
                    .is_some_and(|year| (year - series_year).abs() <= 1)
            })
            .find_map(usable)
    }

    /// Pick the movie entry: the first exact release-year match, else the
    /// first result.
    pub fn select_movie<'a>(
        &self,
        candidates: &'a [CatalogCandidate],
        year: Option<i32>,
    ) -> Option<&'a CatalogCandidate> {
        year.and_then(|year| candidates.iter().find(|c| c.release_year == Some(year)))
            .or_else(|| candidates.first())
    }

    pub fn has_season(&self, series: &CatalogCandidate, season: u32) -> bool {
        series.seasons.iter().any(|s| s.season == season)
    }
}

fn slug(locator: &str) -> String {
    locator.replace('=', "-")
}
