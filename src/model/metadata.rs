//! Book metadata as reported by the metadata reader (`ebook-meta`).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{MailshelfError, Result};

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Title\s+: (.*)$").expect("valid regex"));
static AUTHOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Author\(s\)\s+: (.*)$").expect("valid regex"));

/// Title and author of a book. Both are required.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Metadata {
    pub title: String,
    /// Author list as displayed, e.g. `"A. Author & B. Author"`.
    pub author: String,
}

impl Metadata {
    /// Parse line-oriented `Key   : value` reader output.
    ///
    /// Unknown lines are ignored; if a label repeats, the last one wins.
    pub fn parse(output: &str, path: &Path) -> Result<Self> {
        let mut title = None;
        let mut author = None;

        for line in output.lines() {
            if let Some(caps) = TITLE_LINE.captures(line) {
                title = Some(caps[1].trim_end().to_string());
            }
            if let Some(caps) = AUTHOR_LINE.captures(line) {
                author = Some(strip_author_sort(caps[1].trim_end()).to_string());
            }
        }

        let missing = |field| MailshelfError::MetadataUnavailable {
            path: path.to_path_buf(),
            missing: field,
        };
        let title = title.filter(|t| !t.is_empty()).ok_or_else(|| missing("Title"))?;
        let author = author
            .filter(|a| !a.is_empty())
            .ok_or_else(|| missing("Author(s)"))?;
        Ok(Self { title, author })
    }

    /// First author of the list; exact catalog queries match on a single author.
    pub fn primary_author(&self) -> &str {
        self.author
            .split(" & ")
            .next()
            .map(str::trim)
            .unwrap_or(&self.author)
    }
}

/// Drop the trailing ` [author sort]` annotation the reader appends.
///
/// The annotation is the last balanced bracket group. It is only removed when
/// each of its words also occurs in the name before it, so names that end in
/// brackets themselves are kept.
fn strip_author_sort(value: &str) -> &str {
    let Some(body) = value.strip_suffix(']') else {
        return value;
    };
    let mut depth = 0usize;
    let mut open = None;
    for (i, c) in body.char_indices().rev() {
        match c {
            ']' => depth += 1,
            '[' if depth == 0 => {
                open = Some(i);
                break;
            }
            '[' => depth -= 1,
            _ => {}
        }
    }
    let Some(open) = open else {
        return value;
    };
    let name = value[..open].trim_end();
    if name.is_empty() || name.len() == open {
        return value;
    }

    let name_words = words(name);
    if words(&body[open + 1..]).iter().all(|w| name_words.contains(w)) {
        name
    } else {
        value
    }
}

fn words(s: &str) -> Vec<&str> {
    s.split(|c: char| c.is_whitespace() || c == ',' || c == '&')
        .filter(|w| !w.is_empty())
        .collect()
}
