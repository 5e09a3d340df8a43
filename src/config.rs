//! Configuration management for the compatibility gate
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (proto-compat.toml)
//! - Environment variables (PROTO_COMPAT__*)
//!
//! ## Example config file (proto-compat.toml):
//! ```toml
//! [check]
//! proto_source_root = "src/main/proto"
//! lock_dir = "src/main/proto"
//! options = "--ignore=vendor"
//! allow_breaking_changes = false
//!
//! [build]
//! output_dir = "target"
//! classifier = "linux-x86_64"
//!
//! [plugins]
//! specs = ["com.example:protolock-sample:1.0.0", "protolock-plugin-local"]
//! local_repository = "~/.m2/repository"
//! ```

use std::path::{Path, PathBuf};

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::context::WorkContext;
use crate::error::{GateError, Result};
use crate::lockstate::ensure_no_lockdir_override;
use crate::platform::Platform;
use crate::plugin::{LocalRepositoryResolver, PluginSpec};

/// Main configuration for the gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// What to check and how
    #[serde(default)]
    pub check: CheckConfig,

    /// Build environment
    #[serde(default)]
    pub build: BuildConfig,

    /// protolock plugins
    #[serde(default)]
    pub plugins: PluginConfig,
}

/// Check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Directory holding the .proto sources, passed as `--protoroot`
    #[serde(default = "default_proto_source_root")]
    pub proto_source_root: PathBuf,

    /// Directory holding proto.lock (defaults to the proto source root)
    #[serde(default)]
    pub lock_dir: Option<PathBuf>,

    /// Extra protolock options, appended to every command
    #[serde(default)]
    pub options: Option<String>,

    /// Report breaking changes without failing the build
    #[serde(default)]
    pub allow_breaking_changes: bool,

    /// Skip the check entirely
    #[serde(default)]
    pub skip: bool,
}

/// Build environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build output directory; protolock is provisioned under it
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Platform classifier, e.g. "linux-x86_64"
    #[serde(default)]
    pub classifier: Option<String>,
}

/// Plugin configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin specs, coordinates or plain executable names
    #[serde(default)]
    pub specs: Vec<String>,

    /// Where resolved plugins are copied (defaults to `<output_dir>/protolock-plugins`)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Maven-layout repository used to resolve coordinates
    #[serde(default)]
    pub local_repository: Option<PathBuf>,
}

// Default value functions
fn default_proto_source_root() -> PathBuf {
    PathBuf::from("src/main/proto")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("target")
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            proto_source_root: default_proto_source_root(),
            lock_dir: None,
            options: None,
            allow_breaking_changes: false,
            skip: false,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            classifier: None,
        }
    }
}

/// A validated configuration with every path made absolute
#[derive(Debug, Clone)]
pub struct GatePlan {
    pub platform: Platform,
    pub proto_root: PathBuf,
    pub lock_dir: PathBuf,
    pub context: WorkContext,
    pub plugins: Vec<PluginSpec>,
    pub options: Vec<String>,
    pub local_repository: Option<PathBuf>,
    pub allow_breaking_changes: bool,
}

impl GateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "proto-compat.toml",
            ".proto-compat.toml",
            "config/proto-compat.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "proto-compat") {
            let xdg_config = config_dir.config_dir().join("proto-compat.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (PROTO_COMPAT__*)
        builder = builder.add_source(
            Environment::with_prefix("PROTO_COMPAT")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("plugins.specs")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Check the configuration and resolve it against `base_dir`.
    ///
    /// Everything that can be rejected without running protolock is rejected
    /// here: a missing classifier, malformed plugin specs, and options that
    /// fight with the lock directory setting.
    pub fn validate(&self, base_dir: &Path) -> Result<GatePlan> {
        let platform = Platform::from_classifier(self.build.classifier.as_deref())?;

        let options = parse_options(self.check.options.as_deref())?;
        ensure_no_lockdir_override(&options)?;

        let plugins = self
            .plugins
            .specs
            .iter()
            .map(|s| s.parse::<PluginSpec>())
            .collect::<Result<Vec<_>>>()?;

        let local_repository = match &self.plugins.local_repository {
            Some(repo) => Some(absolutize(base_dir, repo)),
            None => LocalRepositoryResolver::user_default().map(|r| r.root().to_path_buf()),
        };
        let needs_repository = plugins
            .iter()
            .any(|p| matches!(p, PluginSpec::Coordinate(_)));
        if needs_repository && local_repository.is_none() {
            return Err(GateError::config(
                "coordinate plugins need a repository; set `plugins.local_repository`",
            ));
        }

        let proto_root = absolutize(base_dir, &self.check.proto_source_root);
        let lock_dir = self
            .check
            .lock_dir
            .as_ref()
            .map(|d| absolutize(base_dir, d))
            .unwrap_or_else(|| proto_root.clone());

        let mut context = WorkContext::new(absolutize(base_dir, &self.build.output_dir));
        if let Some(dir) = &self.plugins.dir {
            context = context.with_plugin_dir(absolutize(base_dir, dir));
        }

        Ok(GatePlan {
            platform,
            proto_root,
            lock_dir,
            context,
            plugins,
            options,
            local_repository,
            allow_breaking_changes: self.check.allow_breaking_changes,
        })
    }
}

/// Split the free-form options string into arguments using shell quoting
/// rules. Nothing is ever handed to a shell.
pub fn parse_options(raw: Option<&str>) -> Result<Vec<String>> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => shell_words::split(raw)
            .map_err(|e| GateError::config(format!("cannot parse options '{}': {}", raw, e))),
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
