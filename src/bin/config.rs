//! Gate Config CLI
//!
//! View and manage proto-compat configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use proto_compat::GateConfig;

#[derive(Parser)]
#[command(name = "proto-compat-config")]
#[command(about = "View and manage proto-compat configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Show {
        /// Config file to load (optional)
        #[arg(short, long)]
        config: Option<String>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path (default: proto-compat.toml)
        #[arg(short, long, default_value = "proto-compat.toml")]
        output: String,

        /// Classifier to record in the new file
        #[arg(long)]
        classifier: Option<String>,
    },

    /// Validate configuration
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        config: Option<String>,

        /// Project directory relative paths are resolved against
        #[arg(short = 'C', long, default_value = ".")]
        project: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let cfg = GateConfig::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&cfg)?);
            } else {
                // Pretty print
                println!("📋 proto-compat Configuration\n");
                println!("Check:");
                println!("  Proto root: {:?}", cfg.check.proto_source_root);
                println!("  Lock dir: {:?}", cfg.check.lock_dir);
                println!("  Options: {:?}", cfg.check.options);
                println!("  Allow breaking changes: {}", cfg.check.allow_breaking_changes);
                println!("  Skip: {}", cfg.check.skip);

                println!("\nBuild:");
                println!("  Output dir: {:?}", cfg.build.output_dir);
                println!("  Classifier: {:?}", cfg.build.classifier);

                println!("\nPlugins:");
                println!("  Dir: {:?}", cfg.plugins.dir);
                println!("  Local repository: {:?}", cfg.plugins.local_repository);
                for spec in &cfg.plugins.specs {
                    println!("    - {}", spec);
                }
            }
        }

        Commands::Init { output, classifier } => {
            let mut cfg = GateConfig::default();
            cfg.build.classifier = classifier;
            cfg.save(&output)?;
            println!("✅ Created config file: {}", output);
        }

        Commands::Validate { config, project } => {
            let loaded = GateConfig::load_from(config.as_deref())
                .and_then(|cfg| cfg.validate(&project).map(|plan| (cfg, plan)));
            match loaded {
                Ok((cfg, plan)) => {
                    println!("✅ Configuration is valid");
                    println!("   Platform: {}", plan.platform);
                    println!("   Proto root: {:?}", plan.proto_root);
                    println!("   Lock dir: {:?}", plan.lock_dir);
                    println!("   Plugins: {}", cfg.plugins.specs.len());
                }
                Err(e) => {
                    eprintln!("❌ Configuration error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
