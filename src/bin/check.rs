//! Backwards Compatibility Check CLI
//!
//! Runs protolock against the configured proto sources and fails when a
//! schema change breaks backwards compatibility.
//!
//! Exit codes: 0 passed/initialized/skipped, 1 incompatible change, 2 error.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use proto_compat::{
    run_gate, GateConfig, GateError, GateOutcome, LocalRepositoryResolver, PluginResolver,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "proto-compat")]
#[command(about = "Check protobuf schemas for backwards-incompatible changes")]
#[command(version)]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Project directory relative paths are resolved against
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Overrides {
    /// Directory holding the .proto sources
    #[arg(long, global = true)]
    proto_root: Option<PathBuf>,

    /// Directory holding proto.lock
    #[arg(long, global = true)]
    lock_dir: Option<PathBuf>,

    /// Platform classifier, e.g. linux-x86_64
    #[arg(long, global = true)]
    classifier: Option<String>,

    /// Build output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Plugin spec (repeatable)
    #[arg(long = "plugin", global = true)]
    plugins: Vec<String>,

    /// Extra protolock options
    #[arg(long, global = true, allow_hyphen_values = true)]
    options: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the backwards compatibility check
    Check {
        /// Report breaking changes without failing
        #[arg(long)]
        allow_breaking_changes: bool,

        /// Print a JSON report instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Resolve plugins and print their names and the PATH protolock will see
    Plugins,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => {}
        Err(e) => match e.downcast_ref::<GateError>() {
            Some(GateError::CompatibilityFailure {
                message,
                diagnostics,
            }) => {
                for line in diagnostics {
                    eprintln!("   {}", line);
                }
                eprintln!("❌ {}", message);
                std::process::exit(1);
            }
            _ => {
                eprintln!("❌ Error: {:#}", e);
                std::process::exit(2);
            }
        },
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = GateConfig::load_from(cli.config.as_deref())?;
    apply_overrides(&mut config, cli.overrides);
    let project = std::fs::canonicalize(&cli.project)
        .with_context(|| format!("project directory {:?}", cli.project))?;

    match cli.command {
        Commands::Check {
            allow_breaking_changes,
            json,
        } => {
            config.check.allow_breaking_changes |= allow_breaking_changes;
            let report = run_gate(&config, &project)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            match &report.outcome {
                GateOutcome::Skipped { reason } => println!("⏭️  Skipped: {}", reason),
                GateOutcome::Initialized => {
                    println!("✅ Initialized protolock in {:?}", report.lock_dir)
                }
                GateOutcome::Passed => println!("✅ Backwards compatibility check passed."),
                GateOutcome::BreakingAllowed { diagnostics } => {
                    for line in diagnostics {
                        println!("   {}", line);
                    }
                    println!("⚠️  Breaking changes detected (allowed)");
                }
            }
            Ok(())
        }

        Commands::Plugins => {
            let plan = config.validate(&project)?;
            let resolver =
                LocalRepositoryResolver::new(plan.local_repository.clone().unwrap_or_default());
            let inherited = std::env::var_os("PATH").map(|p| p.to_string_lossy().into_owned());
            let resolved = PluginResolver::new(&resolver, &plan.platform).resolve_plugins(
                &plan.plugins,
                &plan.context,
                inherited.as_deref(),
            )?;

            if resolved.is_empty() {
                println!("No plugins configured");
                return Ok(());
            }
            println!("🔌 Plugins:");
            for name in &resolved.names {
                println!("  - {}", name);
            }
            if let Some(path) = &resolved.path {
                println!("\nPATH={}", path);
            }
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut GateConfig, overrides: Overrides) {
    if let Some(root) = overrides.proto_root {
        config.check.proto_source_root = root;
    }
    if overrides.lock_dir.is_some() {
        config.check.lock_dir = overrides.lock_dir;
    }
    if overrides.classifier.is_some() {
        config.build.classifier = overrides.classifier;
    }
    if let Some(dir) = overrides.output_dir {
        config.build.output_dir = dir;
    }
    if !overrides.plugins.is_empty() {
        config.plugins.specs = overrides.plugins;
    }
    if overrides.options.is_some() {
        config.check.options = overrides.options;
    }
}
