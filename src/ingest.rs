//! End-to-end ingestion of one message into the library.
//!
//! The pipeline runs strictly forward:
//! extract → insert → resolve id → convert and attach each other format →
//! clean up. Any failure ends the run. Nothing is rolled back: if a failure
//! happens after the insert, the catalog keeps a single-format entry, which is
//! reported in the log.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{MailshelfError, Result};
use crate::library::{BookId, Library};
use crate::model::format::{Format, FormatSet};
use crate::parser::attachment::{self, AttachmentInfo};
use crate::process::Toolchain;

/// Progress of a single book through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Extracted,
    Inserted,
    IdentityResolved,
    FormatsAttached,
    Cleaned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Extracted => "extracted",
            Self::Inserted => "inserted",
            Self::IdentityResolved => "identity resolved",
            Self::FormatsAttached => "formats attached",
            Self::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// Summary of a successful ingestion.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReport {
    pub subject: Option<String>,
    pub attachment: AttachmentInfo,
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    /// Format the book arrived in.
    pub source_format: Format,
    /// Formats generated and attached to the entry.
    pub added_formats: Vec<Format>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Ties extraction, the library and the conversion tools together.
#[derive(Debug)]
pub struct Ingestor {
    library: Library,
    tools: Toolchain,
    formats: FormatSet,
    temp_dir: Option<PathBuf>,
}

impl Ingestor {
    pub fn new(library: Library, tools: Toolchain, formats: FormatSet) -> Self {
        Self {
            library,
            tools,
            formats,
            temp_dir: None,
        }
    }

    /// Build from configuration, validating it first.
    pub fn from_config(config: &Config, tools: Toolchain) -> Result<Self> {
        config.validate()?;
        let library = Library::from_config(config, tools.clone());
        Ok(Self::new(library, tools, config.format_set()?)
            .with_temp_dir(config.general.temp_dir.clone()))
    }

    /// Directory for extracted and converted books (system temp dir if `None`).
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Read a whole message from `reader` and ingest it.
    pub fn ingest_reader(&self, mut reader: impl Read) -> Result<IngestReport> {
        let mut raw = Vec::new();
        reader
            .read_to_end(&mut raw)
            .map_err(|e| MailshelfError::io("<message>", e))?;
        self.ingest(&raw)
    }

    /// Ingest one raw message.
    pub fn ingest(&self, raw: &[u8]) -> Result<IngestReport> {
        let mut stage = Stage::Received;
        let result = self.run(raw, &mut stage);
        match &result {
            Ok(report) => info!(
                id = %report.book_id,
                title = %report.title,
                "Book delivered to library"
            ),
            Err(e) => {
                warn!(stage = %stage, error = %e, "Ingestion failed");
                if matches!(stage, Stage::Inserted | Stage::IdentityResolved) {
                    warn!(
                        library = %self.library.root().display(),
                        "Catalog entry left with incomplete formats"
                    );
                }
            }
        }
        result
    }

    fn run(&self, raw: &[u8], stage: &mut Stage) -> Result<IngestReport> {
        let started_at = Utc::now();
        let subject = attachment::message_subject(raw);

        let extracted = attachment::extract_book(raw, &self.formats, self.temp_dir.as_deref())?;
        let book = extracted.book;
        *stage = Stage::Extracted;

        let reported_ids = self.library.insert(&book)?;
        *stage = Stage::Inserted;

        let meta = book.read_metadata(&self.tools)?;
        let author = meta.primary_author();
        let id = self
            .library
            .find_id(author, &meta.title)?
            .ok_or_else(|| MailshelfError::BookNotFound {
                author: author.to_string(),
                title: meta.title.clone(),
            })?;
        if !reported_ids.is_empty() && !reported_ids.contains(&id) {
            warn!(
                resolved = %id,
                reported = ?reported_ids,
                "Resolved id differs from the ids reported by the catalog"
            );
        }
        *stage = Stage::IdentityResolved;
        info!(id = %id, "Resolved catalog id");

        let source_format = book.format().clone();
        let mut added_formats = Vec::new();
        for target in self.formats.others(&source_format) {
            let converted = book.convert_to(&self.tools, target)?;
            self.library.attach_format(id, &converted)?;
            converted.delete()?;
            added_formats.push(target.clone());
        }
        *stage = Stage::FormatsAttached;

        book.delete()?;
        *stage = Stage::Cleaned;

        Ok(IngestReport {
            subject,
            attachment: extracted.info,
            book_id: id,
            title: meta.title.clone(),
            author: meta.author.clone(),
            source_format,
            added_formats,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
