//! Image extraction from dataset archives.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::CvatError;

/// File extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tiff", "bmp", "gif"];

/// Returns true if `name` ends with one of [`IMAGE_EXTENSIONS`].
pub fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Extract the image entries of a zip archive below `target`.
///
/// Non-image entries are skipped, as are entries whose path would escape
/// `target`. Returns the extracted paths relative to `target`, in archive
/// order.
pub fn extract_images<R: Read + Seek>(reader: R, target: &Path) -> Result<Vec<PathBuf>, CvatError> {
    let mut archive = ZipArchive::new(reader).map_err(|source| CvatError::Archive { source })?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| CvatError::Archive { source })?;
        if entry.is_dir() || !is_image(entry.name()) {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping archive entry with unsafe path '{}'", entry.name());
            continue;
        };

        let destination = target.join(&relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&destination)?;
        io::copy(&mut entry, &mut file)?;
        extracted.push(relative);
    }

    log::debug!(
        "Extracted {} image(s) to {}",
        extracted.len(),
        target.display()
    );
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn image_suffixes_are_case_insensitive() {
        assert!(is_image("images/a.JPG"));
        assert!(is_image("b.tiff"));
        assert!(!is_image("annotations.xml"));
        assert!(!is_image("noext"));
    }

    #[test]
    fn only_images_are_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let zip = archive(&[
            ("annotations.xml", "<annotations/>"),
            ("images/a.png", "png"),
            ("images/sub/b.jpeg", "jpeg"),
        ]);

        let files = extract_images(zip, dir.path()).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("images/a.png"), PathBuf::from("images/sub/b.jpeg")]
        );
        assert_eq!(fs::read(dir.path().join("images/sub/b.jpeg")).unwrap(), b"jpeg");
        assert!(!dir.path().join("annotations.xml").exists());
    }

    #[test]
    fn escaping_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let zip = archive(&[("../evil.png", "x"), ("ok.png", "y")]);
        let files = extract_images(zip, dir.path()).unwrap();
        assert_eq!(files, vec![PathBuf::from("ok.png")]);
    }

    #[test]
    fn garbage_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_images(Cursor::new(b"not a zip".to_vec()), dir.path()).unwrap_err();
        assert!(matches!(err, CvatError::Archive { .. }));
    }
}
