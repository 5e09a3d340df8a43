//! Platform classifiers
//!
//! A classifier is an `os-arch` string such as `linux-x86_64` or
//! `windows-x86_64`. It selects the embedded protolock binary and decides how
//! executables and PATH entries look on the build host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Name of the verification tool executable, without extension
pub const TOOL_NAME: &str = "protolock";

/// The build host platform, derived from a configured classifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    classifier: String,
}

impl Platform {
    /// Resolve the platform from a configuration-supplied classifier.
    ///
    /// Classifier detection belongs to whoever builds the configuration, so
    /// an absent or blank value is a configuration error.
    pub fn from_classifier(classifier: Option<&str>) -> Result<Self> {
        match classifier.map(str::trim) {
            Some(c) if !c.is_empty() => Ok(Self {
                classifier: c.to_string(),
            }),
            _ => Err(GateError::config(
                "platform classifier is not set; set `classifier` (e.g. \"linux-x86_64\") \
                 in proto-compat.toml, PROTO_COMPAT__CLASSIFIER, or pass --classifier",
            )),
        }
    }

    /// The raw classifier string
    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn is_windows(&self) -> bool {
        self.classifier.starts_with("windows")
    }

    /// Executable suffix for this platform (`.exe` or empty)
    pub fn exe_suffix(&self) -> &'static str {
        if self.is_windows() {
            ".exe"
        } else {
            ""
        }
    }

    /// Separator between entries of the PATH variable
    pub fn path_separator(&self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }

    /// File name of the verification tool, e.g. `protolock.exe`
    pub fn tool_file_name(&self) -> String {
        format!("{}{}", TOOL_NAME, self.exe_suffix())
    }

    /// Key of the embedded resource holding the tool binary for this platform
    pub fn resource_key(&self) -> String {
        format!("{}/{}", self.classifier, self.tool_file_name())
    }

    /// Append the executable suffix to `name` unless it already carries it
    pub fn executable_name(&self, name: &str) -> String {
        let suffix = self.exe_suffix();
        if suffix.is_empty() || name.to_ascii_lowercase().ends_with(suffix) {
            name.to_string()
        } else {
            format!("{}{}", name, suffix)
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.classifier)
    }
}
