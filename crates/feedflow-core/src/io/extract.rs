//! Package archive extraction
//!
//! Package content ships as zip archives. Entries whose names would escape
//! the destination are skipped.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Information about an extracted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
}

/// Extract a zip archive into `dest_dir`, returning the files written.
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };

        let absolute_path = dest_dir.join(&relative_path);
        if entry.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    /// Build an in-memory zip with the given `(path, contents)` entries.
    pub(crate) fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_nested_files() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        fs::write(
            &archive,
            zip_bytes(&[
                ("lib/any/plugin.dll", "binary"),
                ("contentFiles/any/any/readme.txt", "hello"),
            ]),
        )
        .unwrap();

        let dest = dir.path().join("out");
        let files = extract_zip(&archive, &dest).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(
            fs::read_to_string(dest.join("contentFiles/any/any/readme.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_skips_entries_escaping_destination() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        fs::write(
            &archive,
            zip_bytes(&[("../escape.txt", "nope"), ("ok.txt", "fine")]),
        )
        .unwrap();

        let dest = dir.path().join("out");
        let files = extract_zip(&archive, &dest).unwrap();
        assert_eq!(files.len(), 1);
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_rejects_corrupt_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, b"not a zip").unwrap();
        assert!(matches!(
            extract_zip(&archive, &dir.path().join("out")),
            Err(ExtractError::Archive(_))
        ));
    }
}
