//! Subtitle extraction from downloaded zip archives.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// File extensions recognised as subtitle payloads.
pub const SUBTITLE_EXTENSIONS: [&str; 6] = ["srt", "ass", "ssa", "sub", "vtt", "sbv"];

/// Errors that can occur while extracting a subtitle.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Not a readable zip archive.
    #[error("Invalid archive: {0}")]
    Invalid(#[from] ZipError),

    /// The archive holds no subtitle files.
    #[error("No subtitle files in archive")]
    NoSubtitleEntries,

    /// An entry name has no usable file name component.
    #[error("Unsafe archive entry name: {0}")]
    UnsafeEntryName(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Whether an archive entry name carries a subtitle extension.
pub fn is_subtitle_name(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            SUBTITLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Final path component of an archive entry, for either separator style.
fn entry_basename(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next()?;
    match base {
        "" | "." | ".." => None,
        base => Some(base),
    }
}

/// Extract the subtitle from `archive_path` into `target_dir`.
///
/// Non-subtitle entries are ignored. With several subtitles the entry with
/// the largest uncompressed size wins (the first one on a tie). The file is
/// written under its own name with any archive directories dropped.
///
/// Blocking; call from `spawn_blocking` in async code.
pub fn extract_subtitle(archive_path: &Path, target_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;

    let mut best: Option<(usize, u64)> = None;
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() || !is_subtitle_name(entry.name()) {
            continue;
        }
        debug!(entry = %entry.name(), size = entry.size(), "Subtitle entry");
        if best.map_or(true, |(_, size)| entry.size() > size) {
            best = Some((index, entry.size()));
        }
    }

    let (index, _) = best.ok_or(ArchiveError::NoSubtitleEntries)?;
    let mut entry = archive.by_index(index)?;
    let name = entry.name().to_string();
    let base = entry_basename(&name).ok_or_else(|| ArchiveError::UnsafeEntryName(name.clone()))?;

    std::fs::create_dir_all(target_dir)?;
    let output_path = target_dir.join(base);
    let mut output = File::create(&output_path)?;
    if let Err(err) = io::copy(&mut entry, &mut output) {
        drop(output);
        if let Err(remove_err) = std::fs::remove_file(&output_path) {
            warn!(path = %output_path.display(), error = %remove_err, "Failed to remove partial subtitle");
        }
        return Err(err.into());
    }

    debug!(entry = %name, path = %output_path.display(), "Extracted subtitle");
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::zip_archive;
    use tempfile::TempDir;

    fn write_archive(dir: &TempDir, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.path().join("temp_1.zip");
        std::fs::write(&path, zip_archive(entries)).unwrap();
        path
    }

    #[test]
    fn test_subtitle_extensions_case_insensitive() {
        assert!(is_subtitle_name("Movie.SRT"));
        assert!(is_subtitle_name("a/b/movie.ass"));
        assert!(is_subtitle_name("movie.vtt"));
        assert!(!is_subtitle_name("readme.txt"));
        assert!(!is_subtitle_name("srt"));
    }

    #[test]
    fn test_entry_basename_flattens_directories() {
        assert_eq!(entry_basename("Subs/English/movie.srt"), Some("movie.srt"));
        assert_eq!(entry_basename("Subs\\movie.srt"), Some("movie.srt"));
        assert_eq!(entry_basename("../movie.srt"), Some("movie.srt"));
        assert_eq!(entry_basename("subs/"), None);
    }

    #[test]
    fn test_largest_subtitle_wins() {
        let dir = TempDir::new().unwrap();
        let small = [b'a'; 10];
        let large = [b'b'; 100];
        let archive = write_archive(
            &dir,
            &[
                ("small.srt", &small[..]),
                ("notes.txt", &[b'x'; 500][..]),
                ("large.srt", &large[..]),
            ],
        );

        let out = dir.path().join("out");
        let path = extract_subtitle(&archive, &out).unwrap();
        assert_eq!(path, out.join("large.srt"));
        assert_eq!(std::fs::read(&path).unwrap(), large.to_vec());
    }

    #[test]
    fn test_tie_keeps_first_entry() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(&dir, &[("first.srt", &b"12345"[..]), ("second.ass", &b"67890"[..])]);
        let path = extract_subtitle(&archive, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "first.srt");
    }

    #[test]
    fn test_nested_entry_is_flattened() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(&dir, &[("Season 1/Show.S01E01.srt", &b"1\nHi\n"[..])]);
        let path = extract_subtitle(&archive, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Show.S01E01.srt"));
    }

    #[test]
    fn test_no_subtitle_entries() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(&dir, &[("readme.txt", &b"hello"[..])]);
        assert!(matches!(
            extract_subtitle(&archive, dir.path()),
            Err(ArchiveError::NoSubtitleEntries)
        ));
    }

    #[test]
    fn test_checksum_failure_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let payload = [b'Q'; 64];
        let mut bytes = zip_archive(&[("movie.srt", &payload[..])]);
        let offset = bytes
            .windows(payload.len())
            .position(|window| window == &payload[..])
            .unwrap();
        bytes[offset + 10] = b'R';
        let archive = dir.path().join("temp_2.zip");
        std::fs::write(&archive, bytes).unwrap();

        let out = dir.path().join("out");
        assert!(matches!(
            extract_subtitle(&archive, &out),
            Err(ArchiveError::Io(_))
        ));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"<html>not a zip</html>").unwrap();
        assert!(matches!(
            extract_subtitle(&path, dir.path()),
            Err(ArchiveError::Invalid(_))
        ));
    }
}
