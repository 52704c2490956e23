//! Centralized error types for mailshelf.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailshelf library.
#[derive(Error, Debug)]
pub enum MailshelfError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The input could not be parsed as a mail message.
    #[error("Input is not a parseable mail message")]
    InvalidMessage,

    /// No part of the message carries a file with an accepted suffix.
    #[error("No attachment with an accepted book format found")]
    NoAttachmentFound,

    /// A file suffix is not in the accepted format set.
    #[error("Unsupported book format: '{0}'")]
    UnsupportedFormat(String),

    /// The converter exited with a failure status.
    #[error("Conversion of '{source_path}' to {target} failed (exit code {exit_code:?})")]
    ConversionFailed {
        source_path: PathBuf,
        target: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// The metadata reader did not report a required field.
    #[error("Metadata for '{path}' is missing the {missing} field")]
    MetadataUnavailable { path: PathBuf, missing: &'static str },

    /// The catalog refused the book because it already holds it.
    #[error("Book '{0}' already exists in the library")]
    DuplicateBook(PathBuf),

    /// An exact author+title query matched several catalog entries.
    #[error("Query for \"{title}\" by {author} matched {count} books")]
    AmbiguousMatch {
        author: String,
        title: String,
        count: usize,
    },

    /// The freshly inserted book could not be found again.
    #[error("Inserted book \"{title}\" by {author} not found in the library")]
    BookNotFound { author: String, title: String },

    /// A child process exited with a failure status in strict mode.
    #[error("{program} returned exit code {exit_code:?}")]
    ChildProcessFailed {
        program: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// A child process could not be started or its output could not be read.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// A tool produced output that does not follow its known format.
    #[error("Unexpected output from {program}: {reason}")]
    UnexpectedOutput { program: String, reason: String },
}

/// Convenience alias for `Result<T, MailshelfError>`.
pub type Result<T> = std::result::Result<T, MailshelfError>;

impl MailshelfError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code reported for this error, distinct per kind so that
    /// operators can alert on specific failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoAttachmentFound => 10,
            Self::UnsupportedFormat(_) => 11,
            Self::DuplicateBook(_) => 12,
            Self::MetadataUnavailable { .. } => 13,
            Self::BookNotFound { .. } => 14,
            Self::AmbiguousMatch { .. } => 15,
            Self::ConversionFailed { .. } => 16,
            Self::ChildProcessFailed { .. } => 17,
            Self::UnexpectedOutput { .. } => 18,
            Self::InvalidMessage => 65,
            Self::Spawn { .. } => 69,
            Self::Io { .. } => 74,
            Self::Config(_) => 78,
        }
    }

    /// Captured tool output carried by this error, if any.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Self::ConversionFailed { output, .. } | Self::ChildProcessFailed { output, .. } => {
                Some(output.as_str())
            }
            _ => None,
        }
    }
}
