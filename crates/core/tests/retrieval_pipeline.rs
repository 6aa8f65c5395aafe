//! Retrieval pipeline integration tests.
//!
//! These tests drive the search and fetch protocols against the mock catalog:
//! - Movie year disambiguation end to end
//! - Episode series/season resolution and release-name filtering
//! - Archive extraction rules and temporary file cleanup
//! - Failure classification (missing token, HTML page, corrupt archive)

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use subscout_core::{
    catalog::{CatalogCandidate, CatalogError, DownloadedArchive, SeasonEntry},
    config::RetrievalConfig,
    testing::{fixtures, MockCatalog, RecordedCatalogCall},
    FetchError, RetrievalPipeline,
};

/// Test helper holding a pipeline over a mock catalog.
struct TestHarness {
    pipeline: RetrievalPipeline<MockCatalog>,
    catalog: Arc<MockCatalog>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = RetrievalConfig {
            download_dir: temp_dir.path().join("downloads"),
            request_delay_ms: 0,
            language_delay_ms: 0,
            item_delay_ms: 0,
            episode_only_fallback: true,
        };
        let catalog = Arc::new(MockCatalog::new());
        let pipeline = RetrievalPipeline::new(Arc::clone(&catalog), &config);

        Self {
            pipeline,
            catalog,
            temp_dir,
        }
    }

    fn download_dir(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    /// Names of every file left in the download directory.
    fn leftover_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.download_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[tokio::test]
async fn test_nightcrawler_end_to_end() {
    let h = TestHarness::new();
    h.catalog
        .add_search_results(
            "Nightcrawler",
            vec![
                CatalogCandidate::movie("Nightcrawler", Some(2010), "/subtitles/nightcrawler-2010"),
                CatalogCandidate::movie("Nightcrawler", Some(2014), "/subtitles/nightcrawler-2014"),
            ],
        )
        .await;
    let subtitle = fixtures::subtitle_candidate("777", "Nightcrawler.2014.1080p.BluRay");
    h.catalog
        .add_listing("/subtitles/nightcrawler-2014", vec![subtitle.clone()])
        .await;
    h.catalog
        .add_download(
            &subtitle,
            fixtures::zip_download(&[("nightcrawler.srt", &b"1\n00:00:01,000 --> 00:00:02,000\nLou\n"[..])]),
        )
        .await;

    let candidates = h
        .pipeline
        .search("Nightcrawler", Some(2014), "english")
        .await
        .expect("search");
    assert_eq!(candidates, vec![subtitle]);

    let path = h.pipeline.fetch(&candidates[0]).await.expect("fetch");
    assert_eq!(path, h.download_dir().join("nightcrawler.srt"));
    assert!(std::fs::read_to_string(&path).unwrap().contains("Lou"));

    // The temporary archive is gone; only the subtitle remains.
    assert_eq!(h.leftover_files(), vec!["nightcrawler.srt"]);

    let calls = h.catalog.recorded_calls().await;
    assert_eq!(
        calls,
        vec![
            RecordedCatalogCall::SearchTitle {
                query: "Nightcrawler".to_string(),
                include_series: false,
            },
            RecordedCatalogCall::ListSubtitles {
                locator: "/subtitles/nightcrawler-2014".to_string(),
                language: "english".to_string(),
            },
            RecordedCatalogCall::ResolveToken {
                locator: "/subtitle/777".to_string(),
            },
            RecordedCatalogCall::DownloadArchive {
                token: "tok-777".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_movie_without_year_uses_first_result() {
    let h = TestHarness::new();
    h.catalog
        .add_search_results(
            "Solaris",
            vec![
                CatalogCandidate::movie("Solaris", Some(1972), "/subtitles/solaris-1972"),
                CatalogCandidate::movie("Solaris", Some(2002), "/subtitles/solaris-2002"),
            ],
        )
        .await;

    let found = h.pipeline.search("Solaris", None, "english").await.unwrap();
    assert!(found.is_empty());
    assert_eq!(
        h.catalog.recorded_listings().await,
        vec![("/subtitles/solaris-1972".to_string(), "english".to_string())]
    );
}

#[tokio::test]
async fn test_largest_subtitle_in_archive_wins() {
    let h = TestHarness::new();
    let subtitle = fixtures::subtitle_candidate("5", "Movie.2020");
    let small = vec![b's'; 10];
    let large = vec![b'l'; 100];
    h.catalog
        .add_download(
            &subtitle,
            fixtures::zip_download(&[("small.srt", &small[..]), ("large.srt", &large[..])]),
        )
        .await;

    let path = h.pipeline.fetch(&subtitle).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), large);
}

#[tokio::test]
async fn test_missing_token_is_terminal() {
    let h = TestHarness::new();
    let subtitle = fixtures::subtitle_candidate("6", "Movie.2020");

    let err = h.pipeline.fetch(&subtitle).await.unwrap_err();
    assert!(matches!(err, FetchError::MissingToken(ref id) if id == "6"));

    // No download is attempted without a token.
    assert_eq!(h.catalog.call_count().await, 1);
}

#[tokio::test]
async fn test_html_download_is_failure() {
    let h = TestHarness::new();
    let subtitle = fixtures::subtitle_candidate("7", "Movie.2020");
    h.catalog
        .add_download(
            &subtitle,
            DownloadedArchive {
                bytes: b"<!DOCTYPE html><p>Error</p>".to_vec(),
                content_type: Some("text/html".to_string()),
            },
        )
        .await;

    let err = h.pipeline.fetch(&subtitle).await.unwrap_err();
    assert!(matches!(err, FetchError::HtmlResponse));
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn test_corrupt_archive_is_cleaned_up() {
    let h = TestHarness::new();
    let subtitle = fixtures::subtitle_candidate("8", "Movie.2020");
    h.catalog
        .add_download(
            &subtitle,
            DownloadedArchive {
                bytes: b"PK-not-really".to_vec(),
                content_type: Some("application/octet-stream".to_string()),
            },
        )
        .await;

    let err = h.pipeline.fetch(&subtitle).await.unwrap_err();
    assert!(matches!(err, FetchError::Archive(_)));
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn test_archive_without_subtitles_is_cleaned_up() {
    let h = TestHarness::new();
    let subtitle = fixtures::subtitle_candidate("9", "Movie.2020");
    h.catalog
        .add_download(&subtitle, fixtures::zip_download(&[("info.nfo", &b"release notes"[..])]))
        .await;

    assert!(h.pipeline.fetch(&subtitle).await.is_err());
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn test_catalog_error_during_fetch() {
    let h = TestHarness::new();
    let subtitle = fixtures::subtitle_candidate("10", "Movie.2020");
    h.catalog.set_next_error(CatalogError::RateLimitExceeded).await;

    let err = h.pipeline.fetch(&subtitle).await.unwrap_err();
    assert!(matches!(err, FetchError::Catalog(CatalogError::RateLimitExceeded)));
}

#[tokio::test]
async fn test_episode_path_resolves_series_and_season() {
    let h = TestHarness::new();
    h.catalog
        .add_search_results(
            "The Office",
            vec![
                CatalogCandidate::movie("The Office Christmas Party", Some(2016), "/subtitles/office-party"),
                CatalogCandidate::series(
                    "The Office",
                    Some(2001),
                    "/subtitles/the-office-uk",
                    vec![SeasonEntry {
                        season: 1,
                        locator: "/subtitles/the-office-uk/season=1".to_string(),
                        release_year: Some(2001),
                    }],
                ),
                CatalogCandidate::series(
                    "The Office (US)",
                    Some(2005),
                    "/subtitles/the-office-us",
                    vec![
                        SeasonEntry {
                            season: 1,
                            locator: "/subtitles/the-office-us/season=1".to_string(),
                            release_year: Some(2005),
                        },
                        SeasonEntry {
                            season: 2,
                            locator: "/subtitles/the-office-us/season=2".to_string(),
                            release_year: Some(2005),
                        },
                    ],
                ),
            ],
        )
        .await;

    let wanted = fixtures::subtitle_candidate("21", "The.Office.US.S02E01.The.Dundies");
    h.catalog
        .add_listing(
            "/subtitles/the-office-us/season-2",
            vec![
                wanted.clone(),
                fixtures::subtitle_candidate("22", "The.Office.US.S02E02.Sexual.Harassment"),
            ],
        )
        .await;
    h.catalog
        .add_download(&wanted, fixtures::zip_download(&[("Office/The.Office.S02E01.srt", &b"dundies"[..])]))
        .await;

    let request = fixtures::episode_request("The Office", Some(2005), 2, 1);
    let found = h.pipeline.search_episode(&request, "english").await.unwrap();
    assert_eq!(found, vec![wanted.clone()]);

    let path = h.pipeline.fetch(&found[0]).await.unwrap();
    assert_eq!(path, h.download_dir().join("The.Office.S02E01.srt"));

    let calls = h.catalog.recorded_calls().await;
    assert_eq!(
        calls[0],
        RecordedCatalogCall::SearchTitle {
            query: "The Office".to_string(),
            include_series: true,
        }
    );
}
