//! Save a book attachment to a directory without touching the library.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{MailshelfError, Result};
use crate::model::format::FormatSet;
use crate::parser::attachment::find_candidate;

const MAX_FILENAME_LEN: usize = 150;
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Write the first accepted attachment of `raw` into `output_dir`.
///
/// The file keeps its (sanitized) attachment name and book suffix. An
/// existing file is never overwritten: a counter is appended to the stem
/// until a name can be created exclusively.
pub fn save_attachment(raw: &[u8], formats: &FormatSet, output_dir: &Path) -> Result<PathBuf> {
    let candidate = find_candidate(raw, formats)?;
    let format = formats
        .format_of(&candidate.filename)
        .ok_or_else(|| MailshelfError::UnsupportedFormat(candidate.filename.clone()))?;
    std::fs::create_dir_all(output_dir).map_err(|e| MailshelfError::io(output_dir, e))?;

    let ext = sanitize_filename_part(format.as_str(), MAX_FILENAME_LEN);
    let stem = candidate
        .filename
        .strip_suffix(format.as_str())
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(&candidate.filename);
    let stem_len = MAX_FILENAME_LEN.saturating_sub(ext.chars().count() + 1).max(1);
    let stem = sanitize_filename_part(stem, stem_len);

    let path = create_exclusive(output_dir, &stem, &ext, &candidate.payload)?;
    tracing::info!(path = %path.display(), "Saved attachment");
    Ok(path)
}

/// Create `<stem>.<ext>` (or `<stem>_<n>.<ext>`) in `dir` without replacing
/// anything, and write `data` to it.
fn create_exclusive(dir: &Path, stem: &str, ext: &str, data: &[u8]) -> Result<PathBuf> {
    for i in 0..MAX_NAME_ATTEMPTS {
        let name = if i == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}_{i}.{ext}")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(data)
                    .map_err(|e| MailshelfError::io(&path, e))?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(MailshelfError::io(&path, e)),
        }
    }
    Err(MailshelfError::io(
        dir.join(format!("{stem}.{ext}")),
        std::io::Error::new(ErrorKind::AlreadyExists, "no free file name left"),
    ))
}

/// Sanitize a string for use in filenames.
///
/// Replaces invalid characters with `_` and truncates to `max_len`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> FormatSet {
        FormatSet::new(["mobi", "epub"]).unwrap()
    }

    fn message(filename: &str) -> Vec<u8> {
        format!(
            "From: a@example.com\r\nSubject: Book\r\nMIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"XX\"\r\n\r\n\
             --XX\r\nContent-Type: application/octet-stream\r\n\
             Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n\
             BOOK-BYTES\r\n--XX--\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename_part("The Art of War.mobi", 40),
            "The_Art_of_War.mobi"
        );
        assert_eq!(sanitize_filename_part("../../etc/passwd", 40), ".._.._etc_passwd");
        assert_eq!(sanitize_filename_part("..", 40), "unknown");
        assert_eq!(sanitize_filename_part("", 20), "unknown");
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("war.mobi");
        std::fs::write(&existing, b"already here").unwrap();

        let path = save_attachment(&message("war.mobi"), &formats(), tmp.path()).unwrap();
        assert_eq!(path, tmp.path().join("war_1.mobi"));
        assert_eq!(std::fs::read(&existing).unwrap(), b"already here");
        assert_eq!(std::fs::read(&path).unwrap(), b"BOOK-BYTES");

        let again = save_attachment(&message("war.mobi"), &formats(), tmp.path()).unwrap();
        assert_eq!(again, tmp.path().join("war_2.mobi"));
    }

    #[test]
    fn test_long_name_keeps_book_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let long = format!("{}.epub", "a".repeat(400));
        let path = save_attachment(&message(&long), &formats(), tmp.path()).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".epub"), "suffix lost: {name}");
        assert_eq!(name.chars().count(), MAX_FILENAME_LEN);
    }
}
