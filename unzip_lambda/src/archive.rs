//! In-memory zip extraction.
//!
//! The whole archive is buffered before any entry is read, so archive size
//! is bounded by the function's memory allocation.

use std::io::{Cursor, Read};

use crate::error::UnpackError;

/// One file extracted from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, e.g. `sub/b.json`
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Extracts every file entry of `data` in central-directory order.
///
/// Directory entries are skipped. Entries whose extension has no known
/// media type get `fallback_content_type`. Any read failure rejects the
/// whole archive.
pub fn extract_archive(
    data: &[u8],
    fallback_content_type: &str,
) -> Result<Vec<ArchiveEntry>, UnpackError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| UnpackError::InvalidArchive(format!("failed to read {name}: {e}")))?;

        let content_type = content_type_for(&name, fallback_content_type);
        entries.push(ArchiveEntry {
            name,
            content,
            content_type,
        });
    }

    Ok(entries)
}

fn content_type_for(name: &str, fallback: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Builds a zip in memory. Names ending in `/` become directories.
    pub(crate) fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip_data = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut zip_data));
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);

            for (name, content) in files {
                if name.ends_with('/') {
                    zip.add_directory(*name, options).unwrap();
                } else {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(content.as_bytes()).unwrap();
                }
            }
            zip.finish().unwrap();
        }
        zip_data
    }

    #[test]
    fn test_extract_skips_directories() {
        let data = build_zip(&[("a.txt", "hello"), ("sub/", ""), ("sub/b.json", "{}")]);

        let entries = extract_archive(&data, "binary/octet-stream").unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].content, b"hello");
        assert_eq!(entries[0].content_type, "text/plain");
        assert_eq!(entries[1].name, "sub/b.json");
        assert_eq!(entries[1].content, b"{}");
        assert_eq!(entries[1].content_type, "application/json");
    }

    #[test]
    fn test_extract_preserves_archive_order() {
        let data = build_zip(&[("z.txt", "1"), ("a.txt", "2"), ("m.txt", "3")]);

        let names: Vec<_> = extract_archive(&data, "binary/octet-stream")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();

        assert_eq!(names, vec!["z.txt", "a.txt", "m.txt"]);
    }

    #[test]
    fn test_unknown_extension_uses_fallback() {
        let data = build_zip(&[("data.xyz123", "\u{0}\u{1}"), ("README", "no extension")]);

        let entries = extract_archive(&data, "binary/octet-stream").unwrap();
        assert_eq!(entries[0].content_type, "binary/octet-stream");
        assert_eq!(entries[1].content_type, "binary/octet-stream");

        let entries = extract_archive(&data, "application/octet-stream").unwrap();
        assert_eq!(entries[0].content_type, "application/octet-stream");
    }

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for("index.html", "x"), "text/html");
        assert_eq!(content_type_for("img/logo.png", "x"), "image/png");
        assert_eq!(content_type_for("style.CSS", "x"), "text/css");
    }

    #[test]
    fn test_corrupt_archive_is_rejected() {
        let err = extract_archive(b"definitely not a zip archive", "binary/octet-stream")
            .unwrap_err();
        assert!(matches!(err, UnpackError::InvalidArchive(_)));
    }

    #[test]
    fn test_truncated_archive_is_rejected() {
        let data = build_zip(&[("a.txt", "hello world")]);
        let truncated = &data[..data.len() / 2];

        let err = extract_archive(truncated, "binary/octet-stream").unwrap_err();
        assert!(matches!(err, UnpackError::InvalidArchive(_)));
    }

    #[test]
    fn test_empty_archive() {
        let data = build_zip(&[]);
        assert!(extract_archive(&data, "binary/octet-stream").unwrap().is_empty());
    }
}
