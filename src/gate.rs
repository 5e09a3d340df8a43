//! The compatibility gate
//!
//! Wires a validated [`GatePlan`] through provisioning, plugin resolution and
//! the lock-state machine, and turns the result into a build outcome.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{GateConfig, GatePlan};
use crate::error::{GateError, Result};
use crate::invoker::{ProcessInvoker, SystemInvoker};
use crate::lockstate::{CheckRequest, CompatibilityResult, LockStateMachine};
use crate::plugin::{ArtifactResolver, LocalRepositoryResolver, PluginResolver};
use crate::provision::{BinaryProvisioner, EmbeddedResources, ResourceSource};

/// How a gate run ended, short of an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    /// Nothing was checked
    Skipped { reason: String },
    /// A fresh baseline was recorded
    Initialized,
    /// No incompatible change; the baseline was refreshed
    Passed,
    /// Incompatible changes were found but breaking changes are allowed
    BreakingAllowed { diagnostics: Vec<String> },
}

/// Machine-readable summary of a gate run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    pub checked_at: DateTime<Utc>,
    pub proto_root: PathBuf,
    pub lock_dir: PathBuf,
    pub plugins: Vec<String>,
    #[serde(flatten)]
    pub outcome: GateOutcome,
}

pub struct Gate<'a, S, R, I> {
    provisioner: &'a BinaryProvisioner<S>,
    resolver: &'a R,
    invoker: &'a I,
}

impl<'a, S, R, I> Gate<'a, S, R, I>
where
    S: ResourceSource,
    R: ArtifactResolver,
    I: ProcessInvoker,
{
    pub fn new(provisioner: &'a BinaryProvisioner<S>, resolver: &'a R, invoker: &'a I) -> Self {
        Self {
            provisioner,
            resolver,
            invoker,
        }
    }

    /// Run the gate. `inherited_path` is the caller's PATH.
    ///
    /// An incompatible change comes back as
    /// [`GateError::CompatibilityFailure`] unless the plan allows breaking
    /// changes.
    pub fn run(&self, plan: &GatePlan, inherited_path: Option<&str>) -> Result<GateReport> {
        let mut report = GateReport {
            checked_at: Utc::now(),
            proto_root: plan.proto_root.clone(),
            lock_dir: plan.lock_dir.clone(),
            plugins: Vec::new(),
            outcome: GateOutcome::Passed,
        };

        ensure_proto_root(&plan.proto_root)?;

        let binary = self.provisioner.ensure_binary(&plan.platform, &plan.context)?;
        let resolved = PluginResolver::new(self.resolver, &plan.platform).resolve_plugins(
            &plan.plugins,
            &plan.context,
            inherited_path,
        )?;

        let request = CheckRequest {
            lock_dir: plan.lock_dir.clone(),
            proto_root: plan.proto_root.clone(),
            working_dir: plan.proto_root.clone(),
            plugins: resolved.names.clone(),
            path_env: resolved
                .path
                .clone()
                .or_else(|| inherited_path.map(str::to_string)),
            options: plan.options.clone(),
        };
        report.plugins = resolved.names;

        let result = LockStateMachine::new(self.invoker, binary.path()).check(&request)?;
        report.outcome = match result {
            CompatibilityResult::Initialized => GateOutcome::Initialized,
            CompatibilityResult::Passed => GateOutcome::Passed,
            CompatibilityResult::Failed {
                message,
                diagnostics,
            } => {
                if plan.allow_breaking_changes {
                    warn!(
                        changes = diagnostics.len(),
                        "{} Continuing because breaking changes are allowed.", message
                    );
                    GateOutcome::BreakingAllowed { diagnostics }
                } else {
                    for line in &diagnostics {
                        error!("{}", line);
                    }
                    return Err(GateError::CompatibilityFailure {
                        message,
                        diagnostics,
                    });
                }
            }
            CompatibilityResult::Error { command, cause } => {
                return Err(GateError::Tool {
                    command: command.to_string(),
                    cause,
                });
            }
        };
        Ok(report)
    }
}

/// Run the gate for `config` with the embedded binaries, the local artifact
/// repository and real child processes.
pub fn run_gate(config: &GateConfig, base_dir: &Path) -> Result<GateReport> {
    if config.check.skip {
        info!("Skipping backwards compatibility check (skip = true)");
        return Ok(GateReport {
            checked_at: Utc::now(),
            proto_root: base_dir.join(&config.check.proto_source_root),
            lock_dir: config
                .check
                .lock_dir
                .as_ref()
                .map(|d| base_dir.join(d))
                .unwrap_or_else(|| base_dir.join(&config.check.proto_source_root)),
            plugins: Vec::new(),
            outcome: GateOutcome::Skipped {
                reason: "skip is set".to_string(),
            },
        });
    }

    let plan = config.validate(base_dir)?;
    let provisioner = BinaryProvisioner::new(EmbeddedResources);
    let resolver = LocalRepositoryResolver::new(plan.local_repository.clone().unwrap_or_default());
    let inherited_path = std::env::var_os("PATH").map(|p| p.to_string_lossy().into_owned());

    Gate::new(&provisioner, &resolver, &SystemInvoker).run(&plan, inherited_path.as_deref())
}

/// The proto root must be an existing directory. An empty one is fine; the
/// state machine records an empty baseline for it.
fn ensure_proto_root(proto_root: &Path) -> Result<()> {
    if proto_root.is_dir() {
        return Ok(());
    }
    Err(GateError::config(format!(
        "proto source root {} is not a directory; set check.proto_source_root \
         (or --proto-root) to the directory holding your .proto files",
        proto_root.display()
    )))
}
