//! Binary provisioning
//!
//! Copies the protolock executable for the current platform out of the
//! embedded resources into `<output>/protolock-bin/` and marks it
//! executable. Every write is guarded by an existence check, so repeated
//! calls against the same output directory are no-ops.
//!
//! ```text
//! resources/
//! ├── linux-x86_64/protolock
//! ├── osx-x86_64/protolock
//! └── windows-x86_64/protolock.exe
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use tracing::{debug, info};

use crate::checksum::Checksum;
use crate::context::WorkContext;
use crate::error::{GateError, Result};
use crate::platform::Platform;

static EMBEDDED: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/resources");

/// A lookup of binary resources by `<classifier>/<file>` key
pub trait ResourceSource {
    fn resource(&self, key: &str) -> Option<&[u8]>;
}

/// Resources compiled into this crate from `resources/`
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedResources;

impl ResourceSource for EmbeddedResources {
    fn resource(&self, key: &str) -> Option<&[u8]> {
        EMBEDDED.get_file(key).map(|f| f.contents())
    }
}

impl ResourceSource for HashMap<String, Vec<u8>> {
    fn resource(&self, key: &str) -> Option<&[u8]> {
        self.get(key).map(Vec::as_slice)
    }
}

/// Path to a provisioned, runnable protolock executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryHandle {
    path: PathBuf,
}

impl BinaryHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct BinaryProvisioner<S = EmbeddedResources> {
    source: S,
}

impl Default for BinaryProvisioner<EmbeddedResources> {
    fn default() -> Self {
        Self::new(EmbeddedResources)
    }
}

impl<S: ResourceSource> BinaryProvisioner<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Ensure the protolock binary for `platform` exists in the context's
    /// binary directory.
    pub fn ensure_binary(&self, platform: &Platform, ctx: &WorkContext) -> Result<BinaryHandle> {
        let dir = ctx.binary_dir();
        fs::create_dir_all(&dir).map_err(|source| GateError::Provisioning {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(platform.tool_file_name());
        if path.exists() {
            debug!(path = %path.display(), "protolock already provisioned");
            return Ok(BinaryHandle { path });
        }

        let key = platform.resource_key();
        let bytes = self
            .source
            .resource(&key)
            .ok_or_else(|| GateError::UnsupportedPlatform {
                classifier: platform.classifier().to_string(),
                resource: key.clone(),
            })?;

        install_executable(&path, |tmp| fs::write(tmp, bytes)).map_err(|source| {
            GateError::Provisioning {
                path: path.clone(),
                source,
            }
        })?;

        info!(path = %path.display(), classifier = %platform, "Provisioned protolock");
        debug!(sha256 = %Checksum::from_bytes(bytes), "protolock binary digest");
        Ok(BinaryHandle { path })
    }
}

/// Fill a sibling `.partial` file with `write`, mark it executable, then move
/// it over `dest`. A crash mid-copy never leaves a truncated `dest` behind.
pub(crate) fn install_executable<F>(dest: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let mut tmp_name = dest.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".partial");
    let tmp = dest.with_file_name(tmp_name);
    write(&tmp)?;
    mark_executable(&tmp)?;
    fs::rename(&tmp, dest)
}

/// Mark a file rwxrwxr-x. Off Unix the `.exe` suffix is what makes a file
/// runnable, so there is nothing to do.
pub(crate) fn mark_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o775);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
