//! Error types for the compatibility gate

use std::path::PathBuf;

use thiserror::Error;

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Message attached to every failed compatibility check
pub const COMPATIBILITY_FAILED: &str = "Backwards compatibility check failed!";

/// Compatibility gate errors
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported platform: no protolock binary embedded for '{classifier}' (looked for {resource})")]
    UnsupportedPlatform { classifier: String, resource: String },

    #[error("Provisioning failed for {path}: {source}")]
    Provisioning {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin resolution failed for '{spec}': {reason}")]
    PluginResolution { spec: String, reason: String },

    #[error("Failed to run {program}: {source}")]
    SubprocessIo {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("protolock {command} failed: {cause}")]
    Tool { command: String, cause: String },

    #[error("{message}")]
    CompatibilityFailure {
        message: String,
        diagnostics: Vec<String>,
    },
}

impl GateError {
    /// Build a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a plugin resolution error for the given spec
    pub fn plugin(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PluginResolution {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is the expected negative outcome rather than a crash
    pub fn is_compatibility_failure(&self) -> bool {
        matches!(self, Self::CompatibilityFailure { .. })
    }
}

impl From<config_crate::ConfigError> for GateError {
    fn from(err: config_crate::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
