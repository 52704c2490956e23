//! Book attachment selection and extraction.
//!
//! Parts are walked in document order, descending into attached messages.
//! The first part whose filename suffix is an accepted book format wins; parts
//! without a dot in their filename or with any other suffix are skipped.

use std::io::Write;
use std::path::{Path, PathBuf};

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::error::{MailshelfError, Result};
use crate::model::book::BookFile;
use crate::model::format::FormatSet;

const NO_SUBJECT: &str = "[no subject available]";

/// A message part that carries an accepted book file.
#[derive(Debug, Clone)]
pub struct AttachmentCandidate {
    pub filename: String,
    pub content_type: String,
    /// Decoded payload.
    pub payload: Vec<u8>,
}

/// Details of an extracted attachment, kept for logs and reports.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    /// Hex SHA-256 of the decoded payload.
    pub sha256: String,
}

/// An attachment written to its own temporary file.
#[derive(Debug)]
pub struct ExtractedAttachment {
    pub book: BookFile,
    pub info: AttachmentInfo,
}

/// Subject of the message, if it has one.
pub fn message_subject(raw: &[u8]) -> Option<String> {
    MessageParser::default()
        .parse(skip_from_line(raw))
        .and_then(|msg| msg.subject().map(String::from))
}

/// Find the first part whose filename has an accepted suffix.
pub fn find_candidate(raw: &[u8], formats: &FormatSet) -> Result<AttachmentCandidate> {
    let msg = MessageParser::default()
        .parse(skip_from_line(raw))
        .ok_or(MailshelfError::InvalidMessage)?;
    info!(
        subject = msg.subject().unwrap_or(NO_SUBJECT),
        "Processing message"
    );

    find_in_message(&msg, formats).ok_or_else(|| {
        error!("No suitable attachment found");
        MailshelfError::NoAttachmentFound
    })
}

/// Write the first accepted attachment to a new temporary file.
///
/// The file is named `mailshelf-<random>.<suffix>` and lives in `temp_dir`
/// (or the system temp dir). It belongs to the returned [`BookFile`].
pub fn extract_book(
    raw: &[u8],
    formats: &FormatSet,
    temp_dir: Option<&Path>,
) -> Result<ExtractedAttachment> {
    let candidate = find_candidate(raw, formats)?;
    let format = formats
        .format_of(&candidate.filename)
        .ok_or_else(|| MailshelfError::UnsupportedFormat(candidate.filename.clone()))?;

    let suffix = format!(".{format}");
    let dir = temp_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    let mut file = tempfile::Builder::new()
        .prefix("mailshelf-")
        .suffix(&suffix)
        .tempfile_in(&dir)
        .map_err(|e| MailshelfError::io(&dir, e))?;
    let path: PathBuf = file.path().to_path_buf();
    file.write_all(&candidate.payload)
        .and_then(|()| file.flush())
        .map_err(|e| MailshelfError::io(&path, e))?;

    let book = BookFile::new(file.into_temp_path(), formats)?;
    let info = AttachmentInfo {
        size: candidate.payload.len() as u64,
        sha256: format!("{:x}", Sha256::digest(&candidate.payload)),
        filename: candidate.filename,
        content_type: candidate.content_type,
    };
    info!(
        path = %book.path().display(),
        size = %humansize::format_size(info.size, humansize::BINARY),
        "Wrote attachment to temporary file"
    );
    Ok(ExtractedAttachment { book, info })
}

fn find_in_message(msg: &Message<'_>, formats: &FormatSet) -> Option<AttachmentCandidate> {
    for part in &msg.parts {
        if let Some(name) = part.attachment_name() {
            if formats.format_of(name).is_some() {
                let content_type = part
                    .content_type()
                    .map(|ct| match ct.subtype() {
                        Some(sub) => format!("{}/{sub}", ct.ctype()),
                        None => ct.ctype().to_string(),
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                info!(filename = name, content_type = %content_type, "Found book attachment");
                return Some(AttachmentCandidate {
                    filename: name.to_string(),
                    content_type,
                    payload: part_payload(msg, part),
                });
            }
        }
        if let PartType::Message(nested) = &part.body {
            if let Some(found) = find_in_message(nested, formats) {
                return Some(found);
            }
        }
    }
    None
}

/// Decoded payload of `part`, byte for byte.
///
/// Parts labelled `text/*` are charset-decoded by the parser, which replaces
/// invalid sequences. Those are decoded again from the raw body using only
/// the transfer encoding.
fn part_payload(msg: &Message<'_>, part: &MessagePart<'_>) -> Vec<u8> {
    if !matches!(part.body, PartType::Text(_) | PartType::Html(_)) {
        return part.contents().to_vec();
    }
    let raw = msg
        .raw_message()
        .get(part.raw_body_offset()..part.raw_end_offset())
        .unwrap_or_default();
    let encoding = part
        .content_transfer_encoding()
        .map(|e| e.trim().to_ascii_lowercase());
    let decoded = match encoding.as_deref() {
        Some("base64") => base64_decode(raw),
        Some("quoted-printable") => quoted_printable_decode(raw),
        _ => Some(raw.to_vec()),
    };
    decoded.unwrap_or_else(|| part.contents().to_vec())
}

/// Skip the `From ` envelope line some delivery agents prepend.
fn skip_from_line(data: &[u8]) -> &[u8] {
    // Handle BOM
    let data = if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    };

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> FormatSet {
        FormatSet::new(["mobi", "epub"]).unwrap()
    }

    fn message(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut msg = String::from(
            "From: sender@example.com\r\nTo: books@example.com\r\nSubject: A book\r\n\
             MIME-Version: 1.0\r\nContent-Type: multipart/mixed; boundary=\"XX\"\r\n\r\n\
             --XX\r\nContent-Type: text/plain\r\n\r\nHere you go.\r\n",
        );
        for (filename, body) in parts {
            msg.push_str(&format!(
                "--XX\r\nContent-Type: application/octet-stream\r\n\
                 Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n{body}\r\n"
            ));
        }
        msg.push_str("--XX--\r\n");
        msg.into_bytes()
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_first_accepted_part_wins() {
        let raw = message(&[
            ("README", "no dot"),
            ("cover.jpg", "image"),
            ("book.epub", "EPUB-BYTES"),
            ("book.mobi", "MOBI-BYTES"),
        ]);
        let candidate = find_candidate(&raw, &formats()).unwrap();
        assert_eq!(candidate.filename, "book.epub");
        assert_eq!(candidate.content_type, "application/octet-stream");
        assert_eq!(candidate.payload, b"EPUB-BYTES");
    }

    #[test]
    fn test_text_labelled_book_keeps_raw_bytes() {
        let raw = b"From: sender@example.com\r\nSubject: A book\r\n\
MIME-Version: 1.0\r\nContent-Type: multipart/mixed; boundary=\"XX\"\r\n\r\n\
--XX\r\nContent-Type: text/plain; charset=utf-8; name=\"x.mobi\"\r\n\
Content-Transfer-Encoding: base64\r\n\r\nwyj/AA==\r\n--XX--\r\n";
        let candidate = find_candidate(raw, &formats()).unwrap();
        assert_eq!(candidate.filename, "x.mobi");
        assert_eq!(candidate.payload, [0xC3, 0x28, 0xFF, 0x00]);
    }

    #[test]
    fn test_text_labelled_book_quoted_printable() {
        let raw = b"From: sender@example.com\r\nSubject: A book\r\n\
MIME-Version: 1.0\r\nContent-Type: multipart/mixed; boundary=\"XX\"\r\n\r\n\
--XX\r\nContent-Type: text/plain; charset=us-ascii\r\n\
Content-Disposition: attachment; filename=\"q.epub\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\r\nA=FFB\r\n--XX--\r\n";
        let candidate = find_candidate(raw, &formats()).unwrap();
        assert_eq!(candidate.filename, "q.epub");
        assert!(candidate.payload.starts_with(&[b'A', 0xFF, b'B']));
    }

    #[test]
    fn test_suffix_match_is_case_sensitive() {
        let raw = message(&[("BOOK.MOBI", "x")]);
        assert!(matches!(
            find_candidate(&raw, &formats()),
            Err(MailshelfError::NoAttachmentFound)
        ));
    }

    #[test]
    fn test_no_attachment() {
        let raw = message(&[("notes.txt", "hello")]);
        assert!(matches!(
            find_candidate(&raw, &formats()),
            Err(MailshelfError::NoAttachmentFound)
        ));
    }

    #[test]
    fn test_extract_writes_payload_to_suffixed_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = message(&[("war.mobi", "MOBI-BYTES")]);
        let extracted = extract_book(&raw, &formats(), Some(tmp.path())).unwrap();

        let path = extracted.book.path().to_path_buf();
        assert!(path.starts_with(tmp.path()));
        assert_eq!(path.extension().unwrap(), "mobi");
        assert_eq!(std::fs::read(&path).unwrap(), b"MOBI-BYTES");
        assert_eq!(extracted.info.size, 10);
        assert_eq!(extracted.info.sha256.len(), 64);

        drop(extracted);
        assert!(!path.exists());
    }

    #[test]
    fn test_message_subject() {
        let raw = message(&[]);
        assert_eq!(message_subject(&raw).as_deref(), Some("A book"));
    }
}
