//! Subprocess-backed [`CommandRunner`].

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use tracing::debug;

use super::{CommandRunner, Invocation, ProcessOutput};
use crate::error::{MailshelfError, Result};

/// Runs commands as real child processes, blocking until they exit.
///
/// stdout and stderr share one pipe so the captured output keeps the order in
/// which the tool wrote it. No timeout is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        debug!(command = %invocation, "Running");
        let spawn_err = |source| MailshelfError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        let (mut reader, writer) = std::io::pipe().map_err(spawn_err)?;
        let writer_err = writer.try_clone().map_err(spawn_err)?;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdout(writer)
            .stderr(writer_err)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        let mut child = command.spawn().map_err(spawn_err)?;
        // Close the parent's write ends, otherwise the read below never sees EOF.
        drop(command);

        let child_stdin = child.stdin.take();
        let mut raw = Vec::new();
        let read = std::thread::scope(|scope| {
            if let (Some(mut pipe), Some(data)) = (child_stdin, invocation.stdin.as_deref()) {
                scope.spawn(move || {
                    if let Err(e) = pipe.write_all(data) {
                        debug!(error = %e, "Child closed stdin early");
                    }
                });
            }
            reader.read_to_end(&mut raw)
        });
        read.map_err(spawn_err)?;

        let status = child.wait().map_err(spawn_err)?;
        let result = ProcessOutput::new(status.code(), String::from_utf8_lossy(&raw));

        debug!(exit_code = ?result.exit_code, "Finished");
        if !result.output.is_empty() {
            debug!("Output:\n{}", result.output);
        }
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let out = SystemRunner
            .run(&sh("echo to-out; echo to-err 1>&2; exit 3"))
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(out.output.contains("to-out"));
        assert!(out.output.contains("to-err"));
        assert!(!out.success());
    }

    #[test]
    fn test_merged_output_keeps_write_order() {
        let out = SystemRunner
            .run(&sh("echo first; echo second 1>&2; echo third"))
            .unwrap();
        let lines: Vec<&str> = out.output.lines().collect();
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_feeds_stdin() {
        let out = SystemRunner
            .run(&Invocation::new("cat").stdin(b"hello\nworld\n".to_vec()))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.output, "hello\nworld\n");
    }

    #[test]
    fn test_strict_mode_fails_on_nonzero_exit() {
        let err = SystemRunner
            .run_checked(&sh("echo broken library; exit 2"))
            .unwrap_err();
        match err {
            MailshelfError::ChildProcessFailed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, Some(2));
                assert!(output.contains("broken library"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = SystemRunner
            .run(&Invocation::new("mailshelf-no-such-tool-4711"))
            .unwrap_err();
        assert!(matches!(err, MailshelfError::Spawn { .. }));
    }
}
