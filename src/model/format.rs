//! Accepted book formats.

use std::fmt;

use crate::error::{MailshelfError, Result};

/// A book format suffix known to be in the configured [`FormatSet`].
///
/// Values can only be obtained through a `FormatSet`, so holding one proves
/// the suffix is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Format(String);

impl Format {
    /// The suffix without the leading dot.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, de-duplicated set of accepted suffixes (e.g. `mobi`, `epub`).
///
/// The order decides the sequence in which missing formats are generated.
/// Matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct FormatSet {
    formats: Vec<Format>,
}

impl FormatSet {
    /// Build a set from suffix names. Empty sets and names containing dots are rejected.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut formats: Vec<Format> = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() || name.contains('.') || name.contains('/') {
                return Err(MailshelfError::Config(format!(
                    "invalid book format '{name}'"
                )));
            }
            if !formats.iter().any(|f| f.0 == name) {
                formats.push(Format(name.to_string()));
            }
        }
        if formats.is_empty() {
            return Err(MailshelfError::Config(
                "at least one book format must be accepted".into(),
            ));
        }
        Ok(Self { formats })
    }

    /// Look up an accepted format by suffix.
    pub fn get(&self, suffix: &str) -> Option<&Format> {
        self.formats.iter().find(|f| f.0 == suffix)
    }

    /// Like [`FormatSet::get`], failing with `UnsupportedFormat`.
    pub fn require(&self, suffix: &str) -> Result<&Format> {
        self.get(suffix)
            .ok_or_else(|| MailshelfError::UnsupportedFormat(suffix.to_string()))
    }

    /// Accepted format of a file name, judged by the text after its last dot.
    pub fn format_of(&self, filename: &str) -> Option<&Format> {
        suffix_of(filename).and_then(|s| self.get(s))
    }

    /// All formats except `skip`, in configured order.
    pub fn others<'a>(&'a self, skip: &'a Format) -> impl Iterator<Item = &'a Format> + 'a {
        self.formats.iter().filter(move |f| *f != skip)
    }
}

/// Text after the last dot of a file name, or `None` if there is no dot.
pub fn suffix_of(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, suffix)| suffix)
}
