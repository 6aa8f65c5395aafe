//! Testing utilities and in-memory collaborators.
//!
//! The mocks implement [`Catalog`](crate::catalog::Catalog) and
//! [`MediaService`](crate::media_service::MediaService) so the retrieval
//! pipeline and the runner can be driven end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use subscout_core::testing::{fixtures, MockCatalog, MockMediaService};
//!
//! let catalog = MockCatalog::new();
//! let subtitle = fixtures::subtitle_candidate("1", "Nightcrawler.2014.1080p");
//! catalog.add_download(&subtitle, fixtures::zip_download(&[("nightcrawler.srt", b"...")])).await;
//!
//! let service = MockMediaService::new();
//! service.set_wanted(MediaType::Movie, vec![fixtures::movie_request("Nightcrawler", Some(2014))]).await;
//! ```

mod mock_catalog;
mod mock_media_service;

pub use mock_catalog::{MockCatalog, RecordedCatalogCall};
pub use mock_media_service::{MockMediaService, RecordedPostProcess, RecordedUpload};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use crate::catalog::{DownloadedArchive, SubtitleCandidate};
    use crate::media::{LanguageRequest, MediaRequest};

    pub fn english() -> LanguageRequest {
        LanguageRequest::new("English", "en")
    }

    /// A wanted movie missing English subtitles.
    pub fn movie_request(title: &str, year: Option<i32>) -> MediaRequest {
        let movie_id = title.bytes().map(i64::from).sum::<i64>();
        MediaRequest::movie(title, year, movie_id).with_language(english())
    }

    /// A wanted episode missing English subtitles.
    pub fn episode_request(series: &str, year: Option<i32>, season: u32, episode: u32) -> MediaRequest {
        let series_id = series.bytes().map(i64::from).sum::<i64>();
        let episode_id = series_id * 1000 + i64::from(season) * 100 + i64::from(episode);
        MediaRequest::episode(series, year, series_id, episode_id, season, episode)
            .with_language(english())
    }

    /// An English subtitle listing located at `/subtitle/{id}`.
    pub fn subtitle_candidate(id: &str, release_info: &str) -> SubtitleCandidate {
        SubtitleCandidate::new(id, release_info, "english", format!("/subtitle/{}", id))
    }

    /// An in-memory zip archive with the given entries, stored uncompressed.
    pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, contents) in entries {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(contents).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    /// A zip download as the catalog serves it.
    pub fn zip_download(entries: &[(&str, &[u8])]) -> DownloadedArchive {
        DownloadedArchive {
            bytes: zip_archive(entries),
            content_type: Some("application/zip".to_string()),
        }
    }
}
