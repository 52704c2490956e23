//! Classification of catalog `add` output.
//!
//! The catalog tool reports duplicates only in prose, so the wording it uses
//! is isolated behind [`OutputClassifier`] and can be swapped per tool version.

use std::sync::LazyLock;

use regex::Regex;

use super::BookId;
use crate::process::ProcessOutput;

static ADDED_IDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Added book ids?: ([0-9][0-9, ]*)").expect("valid regex"));

/// Outcome of a catalog `add` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The book was added. Ids printed by the tool, if any, are informational only.
    Inserted { reported_ids: Vec<BookId> },
    /// The catalog already holds the book and ignored the add.
    AlreadyExists,
    /// The tool failed for another reason.
    OtherFailure,
}

/// Strategy that maps raw `add` output to an [`AddOutcome`].
pub trait OutputClassifier: Send + Sync {
    fn classify_add(&self, output: &ProcessOutput) -> AddOutcome;
}

/// Classifier for `calibredb`: a duplicate is announced on the first output line.
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    markers: Vec<String>,
}

impl MarkerClassifier {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::new(vec!["following books were not added".to_string()])
    }
}

impl OutputClassifier for MarkerClassifier {
    fn classify_add(&self, output: &ProcessOutput) -> AddOutcome {
        if !output.success() {
            return AddOutcome::OtherFailure;
        }
        let first = output.first_line();
        if self.markers.iter().any(|m| first.contains(m.as_str())) {
            return AddOutcome::AlreadyExists;
        }
        AddOutcome::Inserted {
            reported_ids: reported_ids(&output.output),
        }
    }
}

fn reported_ids(output: &str) -> Vec<BookId> {
    ADDED_IDS
        .captures(output)
        .map(|caps| {
            caps[1]
                .split(',')
                .filter_map(|id| id.trim().parse().ok())
                .map(BookId)
                .collect()
        })
        .unwrap_or_default()
}
