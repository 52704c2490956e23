//! Calibre library access through the catalog tool (`calibredb`).
//!
//! The library is a stateless wrapper around a root directory: everything
//! lives in the external catalog and is observed only through tool output.
//! An insert does not return the new entry's id, so callers re-derive it
//! with an exact author+title [`Library::lookup`].

pub mod classify;
pub mod listing;

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{MailshelfError, Result};
use crate::model::book::BookFile;
use crate::process::{Invocation, Toolchain};

use classify::{AddOutcome, MarkerClassifier, OutputClassifier};

/// Catalog entry id, assigned by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct BookId(pub u64);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of an exact author+title query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found(BookId),
    NotFound,
    /// Several entries match; never resolved to an arbitrary one.
    Ambiguous(Vec<BookId>),
}

/// A catalog rooted at a directory.
pub struct Library {
    root: PathBuf,
    tools: Toolchain,
    classifier: Box<dyn OutputClassifier>,
    list_width: u32,
}

impl Library {
    /// Library with the default `calibredb` output conventions.
    pub fn new(root: impl Into<PathBuf>, tools: Toolchain) -> Self {
        Self {
            root: root.into(),
            tools,
            classifier: Box::new(MarkerClassifier::default()),
            list_width: 9000,
        }
    }

    /// Library configured from `[library]` and `[catalog]`.
    pub fn from_config(config: &Config, tools: Toolchain) -> Self {
        Self::new(&config.library.path, tools)
            .with_classifier(MarkerClassifier::new(
                config.catalog.duplicate_markers.clone(),
            ))
            .with_list_width(config.catalog.list_width)
    }

    pub fn with_classifier(mut self, classifier: impl OutputClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_list_width(mut self, width: u32) -> Self {
        self.list_width = width;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Catalog invocation with the library selector appended.
    fn command<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Invocation::new(self.tools.catalog())
            .args(args)
            .arg("--with-library")
            .arg(&self.root)
    }

    /// Add `book` to the catalog.
    ///
    /// Fails with `DuplicateBook` if the catalog already holds it. Returns the
    /// ids the tool printed, which are informational: the entry's identity
    /// must still be resolved with [`Library::lookup`].
    pub fn insert(&self, book: &BookFile) -> Result<Vec<BookId>> {
        info!(path = %book.path().display(), "Adding book to library");
        let invocation = self.command([OsStr::new("add"), book.path().as_os_str()]);
        let out = self.tools.runner().run(&invocation)?;

        match self.classifier.classify_add(&out) {
            AddOutcome::Inserted { reported_ids } => {
                debug!(ids = ?reported_ids, "Catalog reported added ids");
                Ok(reported_ids)
            }
            AddOutcome::AlreadyExists => {
                warn!("Book not inserted - already exists in the library");
                Err(MailshelfError::DuplicateBook(book.path().to_path_buf()))
            }
            AddOutcome::OtherFailure => Err(MailshelfError::ChildProcessFailed {
                program: invocation.program,
                exit_code: out.exit_code,
                output: out.output,
            }),
        }
    }

    /// Exact-match query on author and title.
    pub fn lookup(&self, author: &str, title: &str) -> Result<LookupResult> {
        let width = self.list_width.to_string();
        let query = listing::exact_query(author, title);
        let invocation = self.command([
            "list",
            "-f",
            "uuid",
            "-s",
            query.as_str(),
            "-w",
            width.as_str(),
        ]);
        let out = self.tools.runner().run_checked(&invocation)?;

        let ids = listing::parse_ids(&out.output).map_err(|reason| {
            MailshelfError::UnexpectedOutput {
                program: invocation.program.clone(),
                reason,
            }
        })?;
        Ok(match ids.len() {
            0 => LookupResult::NotFound,
            1 => LookupResult::Found(ids[0]),
            _ => LookupResult::Ambiguous(ids),
        })
    }

    /// Id of the single entry matching author and title, `None` if there is none.
    ///
    /// Several matches fail with `AmbiguousMatch`.
    pub fn find_id(&self, author: &str, title: &str) -> Result<Option<BookId>> {
        match self.lookup(author, title)? {
            LookupResult::Found(id) => Ok(Some(id)),
            LookupResult::NotFound => Ok(None),
            LookupResult::Ambiguous(ids) => Err(MailshelfError::AmbiguousMatch {
                author: author.to_string(),
                title: title.to_string(),
                count: ids.len(),
            }),
        }
    }

    /// Store `book` as an additional format of entry `id`.
    ///
    /// An existing copy of that format is overwritten.
    pub fn attach_format(&self, id: BookId, book: &BookFile) -> Result<()> {
        info!(
            id = %id,
            path = %book.path().display(),
            "Adding new format for book"
        );
        let id = id.to_string();
        let invocation = self.command([
            OsStr::new("add_format"),
            OsStr::new(&id),
            book.path().as_os_str(),
        ]);
        self.tools.runner().run_checked(&invocation)?;
        Ok(())
    }

    /// Whether the catalog holds no books at all.
    pub fn is_empty(&self) -> Result<bool> {
        let out = self
            .tools
            .runner()
            .run_checked(&self.command(["list", "-f", "uuid"]))?;
        Ok(listing::is_header_only(&out.output))
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("root", &self.root)
            .field("list_width", &self.list_width)
            .finish_non_exhaustive()
    }
}
