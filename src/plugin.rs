//! Plugin resolution
//!
//! protolock discovers plugins by name on PATH. Each configured spec is
//! either an artifact coordinate (`group:artifact:version[:type[:classifier]]`)
//! that is resolved to a file and copied into the plugin directory, or a bare
//! executable name that is expected to already be on PATH.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::context::WorkContext;
use crate::error::{GateError, Result};
use crate::platform::Platform;
use crate::provision::{install_executable, mark_executable};

/// Artifact type assumed when a coordinate omits it
pub const DEFAULT_ARTIFACT_TYPE: &str = "exe";

/// A plugin artifact coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    /// Explicit artifact type, if the spec carried one
    pub packaging: Option<String>,
    pub classifier: Option<String>,
    /// The spec exactly as configured
    #[serde(skip)]
    spec: String,
}

impl Coordinate {
    /// The configured text this coordinate was parsed from
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Artifact type, `exe` unless the spec named one
    pub fn artifact_type(&self) -> &str {
        self.packaging.as_deref().unwrap_or(DEFAULT_ARTIFACT_TYPE)
    }

    /// File name in a Maven-style repository layout
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact,
                self.version,
                c,
                self.artifact_type()
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.artifact_type()),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(packaging) = &self.packaging {
            write!(f, ":{}", packaging)?;
        }
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        Ok(())
    }
}

/// A configured plugin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginSpec {
    /// Resolved through the artifact resolver and copied locally
    Coordinate(Coordinate),
    /// Already on PATH, used as-is
    LiteralName(String),
}

impl FromStr for PluginSpec {
    type Err = GateError;

    fn from_str(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(GateError::plugin(spec, "plugin spec is empty"));
        }

        let segments: Vec<&str> = trimmed.split(':').collect();
        if segments.len() == 1 {
            return Ok(PluginSpec::LiteralName(trimmed.to_string()));
        }
        if !(3..=5).contains(&segments.len()) {
            return Err(GateError::plugin(
                spec,
                "expected a plain name or group:artifact:version[:type[:classifier]]",
            ));
        }
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(GateError::plugin(spec, "coordinate has an empty segment"));
        }

        let owned = |i: usize| segments.get(i).map(|s| s.trim().to_string());
        Ok(PluginSpec::Coordinate(Coordinate {
            group: segments[0].trim().to_string(),
            artifact: segments[1].trim().to_string(),
            version: segments[2].trim().to_string(),
            packaging: owned(3),
            classifier: owned(4),
            spec: spec.to_string(),
        }))
    }
}

impl fmt::Display for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSpec::Coordinate(c) => write!(f, "{}", c.spec),
            PluginSpec::LiteralName(name) => write!(f, "{}", name),
        }
    }
}

/// Failure reported by an [`ArtifactResolver`]
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Resolves coordinates to local files. Stands in for the host build
/// system's dependency resolution.
pub trait ArtifactResolver {
    fn resolve(&self, coordinate: &Coordinate) -> std::result::Result<PathBuf, ResolveError>;
}

/// Resolver over a Maven-layout repository on disk (`~/.m2/repository`)
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    root: PathBuf,
}

impl LocalRepositoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The user's default local repository, if a home directory is known
    pub fn user_default() -> Option<Self> {
        directories::UserDirs::new()
            .map(|dirs| Self::new(dirs.home_dir().join(".m2").join("repository")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `coordinate` lives in this repository
    pub fn artifact_path(&self, coordinate: &Coordinate) -> PathBuf {
        let mut path = self.root.clone();
        for part in coordinate.group.split('.') {
            path.push(part);
        }
        path.push(&coordinate.artifact);
        path.push(&coordinate.version);
        path.push(coordinate.file_name());
        path
    }
}

impl ArtifactResolver for LocalRepositoryResolver {
    fn resolve(&self, coordinate: &Coordinate) -> std::result::Result<PathBuf, ResolveError> {
        let path = self.artifact_path(coordinate);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ResolveError::NotFound(path.display().to_string()))
        }
    }
}

/// Plugins ready to hand to protolock
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedPlugins {
    /// Executable names, in configuration order
    pub names: Vec<String>,
    /// PATH value with the plugin directory appended; `None` without plugins
    pub path: Option<String>,
}

impl ResolvedPlugins {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct PluginResolver<'a, R: ArtifactResolver> {
    resolver: &'a R,
    platform: &'a Platform,
}

impl<'a, R: ArtifactResolver> PluginResolver<'a, R> {
    pub fn new(resolver: &'a R, platform: &'a Platform) -> Self {
        Self { resolver, platform }
    }

    /// Resolve every spec in order. The first failure aborts the whole run.
    ///
    /// `inherited_path` is the PATH the plugin directory gets appended to.
    pub fn resolve_plugins(
        &self,
        specs: &[PluginSpec],
        ctx: &WorkContext,
        inherited_path: Option<&str>,
    ) -> Result<ResolvedPlugins> {
        if specs.is_empty() {
            return Ok(ResolvedPlugins::default());
        }

        let mut names = Vec::with_capacity(specs.len());
        for spec in specs {
            let name = match spec {
                PluginSpec::Coordinate(coordinate) => self.install(coordinate, ctx)?,
                PluginSpec::LiteralName(name) => name.clone(),
            };
            debug!(spec = %spec, name = %name, "Resolved plugin");
            names.push(name);
        }

        let plugin_dir = ctx.plugin_dir().display().to_string();
        let path = match inherited_path {
            Some(p) if !p.is_empty() => {
                format!("{}{}{}", p, self.platform.path_separator(), plugin_dir)
            }
            _ => plugin_dir,
        };

        Ok(ResolvedPlugins {
            names,
            path: Some(path),
        })
    }

    fn install(&self, coordinate: &Coordinate, ctx: &WorkContext) -> Result<String> {
        let spec = coordinate.spec();
        let source = self
            .resolver
            .resolve(coordinate)
            .map_err(|e| GateError::plugin(spec, e.to_string()))?;

        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                GateError::plugin(
                    spec,
                    format!("resolved path {} has no usable file name", source.display()),
                )
            })?;
        let name = self.platform.executable_name(file_name);
        let dest = ctx.plugin_dir().join(&name);

        let copy = || -> std::io::Result<()> {
            if dest.exists() {
                return mark_executable(&dest);
            }
            fs::create_dir_all(ctx.plugin_dir())?;
            install_executable(&dest, |tmp| fs::copy(&source, tmp).map(|_| ()))?;
            info!(plugin = %name, from = %source.display(), "Installed protolock plugin");
            Ok(())
        };
        copy().map_err(|e| {
            GateError::plugin(
                spec,
                format!("could not install into {}: {}", dest.display(), e),
            )
        })?;

        Ok(name)
    }
}
