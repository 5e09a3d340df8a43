//! Child process execution
//!
//! The tool is always launched with an explicit argv and a replacement
//! environment. Stdout is captured in full; stderr goes straight to ours.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{GateError, Result};

/// What a finished child process left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

/// Runs a program to completion
pub trait ProcessInvoker {
    /// Spawn `program` with exactly `args` and `env` in `working_dir`, block
    /// until it exits and return its exit code and stdout.
    fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, String)],
        working_dir: &Path,
    ) -> Result<ProcessOutput>;
}

/// [`ProcessInvoker`] backed by `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInvoker;

impl ProcessInvoker for SystemInvoker {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, String)],
        working_dir: &Path,
    ) -> Result<ProcessOutput> {
        let io_err = |source: std::io::Error| GateError::SubprocessIo {
            program: program.to_path_buf(),
            source,
        };

        debug!(program = %program.display(), ?args, cwd = %working_dir.display(), "Spawning");
        let mut child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k, v)))
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(io_err)?;

        // Drain stdout before waiting so a chatty child cannot fill the pipe
        // and block forever.
        let mut raw = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout.read_to_end(&mut raw).map_err(io_err)?;
        }
        let status = child.wait().map_err(io_err)?;

        Ok(ProcessOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&raw).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemInvoker
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "echo one; echo two; exit 3".to_string()],
                &[],
                dir.path(),
            )
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.lines().collect::<Vec<_>>(), vec!["one", "two"]);
        assert!(!out.success());
    }

    #[test]
    fn test_environment_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemInvoker
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "echo \"[$HOME][$MARKER]\"".to_string()],
                &[("MARKER".to_string(), "set".to_string())],
                dir.path(),
            )
            .unwrap();
        assert_eq!(out.stdout.trim(), "[][set]");
    }

    #[test]
    fn test_arguments_are_not_shell_split() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemInvoker
            .run(
                Path::new("/bin/sh"),
                &[
                    "-c".to_string(),
                    "printf '%s\\n' \"$1\"".to_string(),
                    "sh".to_string(),
                    "a path/with spaces".to_string(),
                ],
                &[],
                dir.path(),
            )
            .unwrap();
        assert_eq!(out.stdout, "a path/with spaces\n");
    }

    #[test]
    fn test_missing_program_is_subprocess_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SystemInvoker
            .run(Path::new("/nonexistent/protolock"), &[], &[], dir.path())
            .unwrap_err();
        assert!(matches!(err, GateError::SubprocessIo { .. }));
    }
}
