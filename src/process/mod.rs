//! External command execution.
//!
//! Every catalog, conversion and metadata operation goes through a
//! [`CommandRunner`]. Production code uses [`SystemRunner`]; tests plug in
//! in-memory doubles.

pub mod runner;
#[cfg(test)]
pub(crate) mod testing;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::error::{MailshelfError, Result};

pub use runner::SystemRunner;

/// A single external command: program, argument vector and optional stdin.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Arguments as lossy UTF-8 strings (for logging and test doubles).
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// stdout and stderr merged in the order they were written.
    pub output: String,
}

impl ProcessOutput {
    pub fn new(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// First line of output, empty if there was none.
    pub fn first_line(&self) -> &str {
        self.output.lines().next().unwrap_or("")
    }

    /// Turn a failure status into `ChildProcessFailed`.
    pub fn check(self, program: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(MailshelfError::ChildProcessFailed {
                program: program.to_string(),
                exit_code: self.exit_code,
                output: self.output,
            })
        }
    }
}

/// Capability to run external commands synchronously.
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A nonzero exit is reported in the output, not as an error.
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput>;

    /// Strict mode: a nonzero exit fails with `ChildProcessFailed`.
    fn run_checked(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        self.run(invocation)?.check(&invocation.program)
    }
}

/// A shared runner together with the configured tool executables.
#[derive(Clone)]
pub struct Toolchain {
    runner: Arc<dyn CommandRunner>,
    tools: ToolsConfig,
}

impl Toolchain {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: ToolsConfig) -> Self {
        Self { runner, tools }
    }

    /// Toolchain backed by real subprocesses.
    pub fn system(tools: ToolsConfig) -> Self {
        Self::new(Arc::new(SystemRunner), tools)
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn catalog(&self) -> &str {
        &self.tools.catalog
    }

    pub fn converter(&self) -> &str {
        &self.tools.converter
    }

    pub fn metadata_reader(&self) -> &str {
        &self.tools.metadata
    }
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}
