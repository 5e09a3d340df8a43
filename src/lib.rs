//! proto-compat
//!
//! A build-time gate that keeps protobuf schemas backwards compatible. The
//! diffing itself is done by [protolock](https://github.com/nilslice/protolock);
//! this crate provisions the right protolock binary for the build host,
//! resolves protolock plugins, and drives the lock file through its
//! lifecycle.
//!
//! ## Flow
//!
//! ```text
//! classifier ──▶ provision ──▶ plugins ──▶ lockstate ──▶ outcome
//!                (protolock-bin/) (PATH)   init | status + commit
//! ```
//!
//! - No `proto.lock` yet: `protolock init` records a baseline.
//! - Otherwise `protolock status` compares the current schemas against the
//!   baseline. A clean status is followed by `protolock commit`, which makes
//!   the current schemas the new baseline. A dirty status fails the build
//!   with every diagnostic protolock printed.
//!
//! ## Layout
//!
//! ```text
//! target/
//! ├── protolock-bin/
//! │   └── protolock
//! └── protolock-plugins/
//!     └── <resolved plugin executables>
//! src/main/proto/
//! ├── *.proto
//! └── proto.lock
//! ```

pub mod checksum;
pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod invoker;
pub mod lockstate;
pub mod platform;
pub mod plugin;
pub mod provision;

pub use checksum::Checksum;
pub use config::{GateConfig, GatePlan};
pub use context::WorkContext;
pub use error::{GateError, Result};
pub use gate::{run_gate, Gate, GateOutcome, GateReport};
pub use invoker::{ProcessInvoker, ProcessOutput, SystemInvoker};
pub use lockstate::{CheckRequest, CompatibilityResult, LockStateMachine, ToolCommand};
pub use platform::Platform;
pub use plugin::{ArtifactResolver, LocalRepositoryResolver, PluginResolver, PluginSpec};
pub use provision::{BinaryHandle, BinaryProvisioner, EmbeddedResources, ResourceSource};
