//! Book files on disk, independent of any library.

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{info, warn};

use super::format::{suffix_of, Format, FormatSet};
use super::metadata::Metadata;
use crate::error::{MailshelfError, Result};
use crate::process::{Invocation, Toolchain};

/// A book artifact owned by this process.
///
/// The backing file is removed by [`BookFile::delete`], or when the value is
/// dropped, so early returns never leave temporary books behind.
#[derive(Debug)]
pub struct BookFile {
    path: TempPath,
    format: Format,
}

impl BookFile {
    /// Take ownership of `path`. Fails with `UnsupportedFormat` (removing the
    /// file) if its suffix is not accepted.
    pub fn new(path: TempPath, formats: &FormatSet) -> Result<Self> {
        let suffix = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(suffix_of)
            .unwrap_or("")
            .to_string();
        let format = formats.require(&suffix)?.clone();
        Ok(Self { path, format })
    }

    /// Take ownership of an existing file at `path`.
    pub fn adopt(path: impl Into<PathBuf>, formats: &FormatSet) -> Result<Self> {
        Self::new(TempPath::from_path(path.into()), formats)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Convert into `target` next to this file. The source is kept.
    pub fn convert_to(&self, tools: &Toolchain, target: &Format) -> Result<BookFile> {
        info!(
            path = %self.path.display(),
            format = %target,
            "Converting book"
        );
        if *target == self.format {
            return Err(MailshelfError::ConversionFailed {
                source_path: self.path.to_path_buf(),
                target: target.to_string(),
                exit_code: None,
                output: "source is already in the target format".to_string(),
            });
        }
        let target_path = self.path.with_extension(target.as_str());
        // Owned before the converter runs so partial output is removed on failure.
        let converted = BookFile {
            path: TempPath::from_path(&target_path),
            format: target.clone(),
        };

        let invocation = Invocation::new(tools.converter())
            .arg(self.path())
            .arg(&target_path);
        let out = tools.runner().run(&invocation)?;
        if !out.success() {
            return Err(MailshelfError::ConversionFailed {
                source_path: self.path.to_path_buf(),
                target: target.to_string(),
                exit_code: out.exit_code,
                output: out.output,
            });
        }
        if !target_path.is_file() {
            return Err(MailshelfError::ConversionFailed {
                source_path: self.path.to_path_buf(),
                target: target.to_string(),
                exit_code: out.exit_code,
                output: format!("{}\n(no output file was written)", out.output),
            });
        }
        Ok(converted)
    }

    /// Read title and author with the metadata reader.
    pub fn read_metadata(&self, tools: &Toolchain) -> Result<Metadata> {
        info!(path = %self.path.display(), "Reading metadata");
        let invocation = Invocation::new(tools.metadata_reader()).arg(self.path());
        let out = tools.runner().run_checked(&invocation)?;
        Metadata::parse(&out.output, &self.path).inspect_err(|_| {
            warn!(path = %self.path.display(), "Required metadata not present");
        })
    }

    /// Remove the backing file.
    pub fn delete(self) -> Result<()> {
        let path = self.path.to_path_buf();
        self.path
            .close()
            .map_err(|e| MailshelfError::io(path, e))
    }
}
