//! Lock-file state machine
//!
//! ```text
//!            init ok
//!   NoLock ───────────▶ Locked ◀──────────────┐
//!                          │ status            │ commit ok
//!                          ▼                   │
//!                      Verifying ──────────────┘
//!                          │ status nonzero
//!                          ▼
//!                       Failed
//! ```
//!
//! Presence of `proto.lock` in the lock directory is the only state this
//! module inspects. The file itself belongs to protolock.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GateError, Result, COMPATIBILITY_FAILED};
use crate::invoker::{ProcessInvoker, ProcessOutput};

/// File protolock keeps its baseline in
pub const LOCK_FILE_NAME: &str = "proto.lock";

/// A protolock subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCommand {
    Init,
    Status,
    Commit,
}

impl ToolCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCommand::Init => "init",
            ToolCommand::Status => "status",
            ToolCommand::Commit => "commit",
        }
    }

    /// Only `status` evaluates plugins
    fn takes_plugins(&self) -> bool {
        matches!(self, ToolCommand::Status)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a baseline exists yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    NoLock,
    Locked,
}

impl LockState {
    pub fn probe(lock_dir: &Path) -> Self {
        if lock_dir.join(LOCK_FILE_NAME).exists() {
            LockState::Locked
        } else {
            LockState::NoLock
        }
    }
}

/// Outcome of one compatibility check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CompatibilityResult {
    /// No baseline existed; one was created
    Initialized,
    /// No incompatible change; the baseline was refreshed
    Passed,
    /// protolock found incompatible changes
    Failed {
        message: String,
        diagnostics: Vec<String>,
    },
    /// protolock itself misbehaved
    Error { command: ToolCommand, cause: String },
}

impl CompatibilityResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CompatibilityResult::Initialized | CompatibilityResult::Passed
        )
    }
}

/// Reject free-form options that try to set the lock directory; it has its
/// own structured setting.
pub fn ensure_no_lockdir_override(options: &[String]) -> Result<()> {
    let pattern =
        Regex::new(r"^--?lockdir(=.*)?$").map_err(|e| GateError::config(e.to_string()))?;
    if let Some(opt) = options.iter().find(|o| pattern.is_match(o)) {
        return Err(GateError::config(format!(
            "option '{}' overrides the lock directory; use the `lock_dir` setting instead",
            opt
        )));
    }
    Ok(())
}

/// Everything one compatibility check needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub lock_dir: PathBuf,
    pub proto_root: PathBuf,
    pub working_dir: PathBuf,
    /// Plugin executable names, passed as `--plugins=`
    pub plugins: Vec<String>,
    /// PATH for the child process
    pub path_env: Option<String>,
    /// Free-form options appended to every command
    pub options: Vec<String>,
}

/// One concrete protolock call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: ToolCommand,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
}

impl CommandInvocation {
    pub fn build(command: ToolCommand, req: &CheckRequest) -> Self {
        let mut args = vec![command.as_str().to_string()];
        if command.takes_plugins() && !req.plugins.is_empty() {
            args.push(format!("--plugins={}", req.plugins.join(",")));
        }
        args.push(format!("--lockdir={}", req.lock_dir.display()));
        args.push(format!("--protoroot={}", req.proto_root.display()));
        args.extend(req.options.iter().cloned());

        let env = req
            .path_env
            .as_ref()
            .map(|p| vec![("PATH".to_string(), p.clone())])
            .unwrap_or_default();

        Self {
            command,
            args,
            env,
            working_dir: req.working_dir.clone(),
        }
    }
}

/// Drives protolock through init, status and commit
pub struct LockStateMachine<'a, I: ProcessInvoker> {
    invoker: &'a I,
    binary: &'a Path,
}

impl<'a, I: ProcessInvoker> LockStateMachine<'a, I> {
    pub fn new(invoker: &'a I, binary: &'a Path) -> Self {
        Self { invoker, binary }
    }

    /// Run one check against the baseline in `req.lock_dir`.
    pub fn check(&self, req: &CheckRequest) -> Result<CompatibilityResult> {
        ensure_no_lockdir_override(&req.options)?;

        match LockState::probe(&req.lock_dir) {
            LockState::NoLock => {
                let out = self.run(ToolCommand::Init, req)?;
                if out.success() {
                    info!(lock_dir = %req.lock_dir.display(), "Initialized protolock");
                    Ok(CompatibilityResult::Initialized)
                } else {
                    Ok(tool_error(ToolCommand::Init, &out, "could not create baseline"))
                }
            }
            LockState::Locked => {
                let status = self.run(ToolCommand::Status, req)?;
                if !status.success() {
                    return Ok(CompatibilityResult::Failed {
                        message: COMPATIBILITY_FAILED.to_string(),
                        diagnostics: status.lines().map(str::to_string).collect(),
                    });
                }

                // Status found nothing incompatible; record the current
                // schema as the new baseline.
                let commit = self.run(ToolCommand::Commit, req)?;
                if commit.success() {
                    info!("Backwards compatibility check passed.");
                    Ok(CompatibilityResult::Passed)
                } else {
                    Ok(tool_error(ToolCommand::Commit, &commit, "could not persist baseline"))
                }
            }
        }
    }

    /// Run one protolock command, forwarding every stdout line to the log
    /// before anyone looks at the exit code.
    fn run(&self, command: ToolCommand, req: &CheckRequest) -> Result<ProcessOutput> {
        let invocation = CommandInvocation::build(command, req);
        debug!(%command, args = ?invocation.args, "Running protolock");

        let out = self.invoker.run(
            self.binary,
            &invocation.args,
            &invocation.env,
            &invocation.working_dir,
        )?;
        for line in out.lines() {
            info!(target: "protolock", "{}", line);
        }
        debug!(%command, exit_code = out.exit_code, "protolock exited");
        Ok(out)
    }
}

fn tool_error(command: ToolCommand, out: &ProcessOutput, what: &str) -> CompatibilityResult {
    CompatibilityResult::Error {
        command,
        cause: format!("{} (exit code {})", what, out.exit_code),
    }
}
