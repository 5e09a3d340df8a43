//! Directory-scoped working context
//!
//! Provisioned binaries and resolved plugins live under the build output
//! directory and are shared by every invocation that points at it. The
//! context names those directories; it is passed explicitly into every
//! operation that touches them.

use std::path::{Path, PathBuf};

/// Directory holding the provisioned protolock binary, under the output dir
pub const BINARY_DIR_NAME: &str = "protolock-bin";

/// Default plugin directory name, under the output dir
pub const PLUGIN_DIR_NAME: &str = "protolock-plugins";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkContext {
    output_dir: PathBuf,
    plugin_dir: PathBuf,
}

impl WorkContext {
    /// Context rooted at a build output directory, with the default plugin dir
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let plugin_dir = output_dir.join(PLUGIN_DIR_NAME);
        Self {
            output_dir,
            plugin_dir,
        }
    }

    /// Override the plugin directory
    pub fn with_plugin_dir(mut self, plugin_dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = plugin_dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn binary_dir(&self) -> PathBuf {
        self.output_dir.join(BINARY_DIR_NAME)
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let ctx = WorkContext::new("/build/target");
        assert_eq!(ctx.binary_dir(), PathBuf::from("/build/target/protolock-bin"));
        assert_eq!(ctx.plugin_dir(), Path::new("/build/target/protolock-plugins"));
    }

    #[test]
    fn test_plugin_dir_override() {
        let ctx = WorkContext::new("/build/target").with_plugin_dir("/opt/plugins");
        assert_eq!(ctx.plugin_dir(), Path::new("/opt/plugins"));
        assert_eq!(ctx.output_dir(), Path::new("/build/target"));
    }
}
