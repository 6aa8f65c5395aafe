use serde::{Deserialize, Serialize};

/// Whether a catalog entry is a movie or a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Movie,
    Series,
}

/// One season listed under a series entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonEntry {
    pub season: u32,
    /// Link to the season's subtitle listing. May be empty.
    pub locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
}

/// A title search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    pub title: String,
    pub kind: CatalogKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    /// Link to the entry's subtitle listing. May be empty.
    pub locator: String,
    #[serde(default)]
    pub seasons: Vec<SeasonEntry>,
}

impl CatalogCandidate {
    pub fn movie(title: impl Into<String>, release_year: Option<i32>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: CatalogKind::Movie,
            release_year,
            locator: locator.into(),
            seasons: Vec::new(),
        }
    }

    pub fn series(
        title: impl Into<String>,
        release_year: Option<i32>,
        locator: impl Into<String>,
        seasons: Vec<SeasonEntry>,
    ) -> Self {
        Self {
            title: title.into(),
            kind: CatalogKind::Series,
            release_year,
            locator: locator.into(),
            seasons,
        }
    }

    pub fn is_series(&self) -> bool {
        self.kind == CatalogKind::Series
    }
}

/// One subtitle listing for a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleCandidate {
    pub id: String,
    pub release_info: String,
    pub language: String,
    /// Link used to resolve the download token.
    pub locator: String,
    #[serde(default)]
    pub hearing_impaired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
}

impl SubtitleCandidate {
    pub fn new(
        id: impl Into<String>,
        release_info: impl Into<String>,
        language: impl Into<String>,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            release_info: release_info.into(),
            language: language.into(),
            locator: locator.into(),
            hearing_impaired: false,
            rating: None,
            upload_date: None,
        }
    }
}

/// Raw archive download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArchive {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl DownloadedArchive {
    /// Whether the server sent an HTML page instead of an archive.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_content_type_detection() {
        let archive = |ct: Option<&str>| DownloadedArchive {
            bytes: vec![],
            content_type: ct.map(str::to_string),
        };
        assert!(archive(Some("text/html; charset=utf-8")).is_html());
        assert!(archive(Some("Text/HTML")).is_html());
        assert!(!archive(Some("application/zip")).is_html());
        assert!(!archive(None).is_html());
    }
}
