//! End-to-end gate runs
//!
//! A shell-script stand-in for protolock is provisioned from an in-memory
//! resource map and driven through init, status and commit against real
//! files.

#![cfg(unix)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use proto_compat::{
    BinaryProvisioner, Gate, GateConfig, GateError, GateOutcome, GatePlan,
    LocalRepositoryResolver, SystemInvoker,
};

// Spawning while another thread still holds a freshly written executable
// open fails with ETXTBSY, so the tests in this file take turns.
static SERIAL: Mutex<()> = Mutex::new(());

const CLASSIFIER: &str = "linux-x86_64";

struct Project {
    dir: tempfile::TempDir,
    config: GateConfig,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/main/proto")).unwrap();

        let mut config = GateConfig::default();
        config.build.classifier = Some(CLASSIFIER.to_string());
        config.plugins.local_repository = Some(dir.path().join("repo"));
        Self { dir, config }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn proto_dir(&self) -> PathBuf {
        self.root().join("src/main/proto")
    }

    fn lock_file(&self) -> PathBuf {
        self.proto_dir().join("proto.lock")
    }

    fn write_proto(&self, fixture: &str) {
        let content = fs::read_to_string(fixtures().join(fixture)).unwrap();
        fs::write(self.proto_dir().join("test.proto"), content).unwrap();
    }

    fn plan(&self) -> GatePlan {
        self.config.validate(self.root()).unwrap()
    }

    fn run(&self) -> proto_compat::Result<GateOutcome> {
        let plan = self.plan();
        let provisioner = fake_protolock();
        let resolver =
            LocalRepositoryResolver::new(plan.local_repository.clone().unwrap_or_default());
        let path = std::env::var("PATH").ok();
        Gate::new(&provisioner, &resolver, &SystemInvoker)
            .run(&plan, path.as_deref())
            .map(|report| report.outcome)
    }
}

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fake_protolock() -> BinaryProvisioner<HashMap<String, Vec<u8>>> {
    let mut resources = HashMap::new();
    resources.insert(
        format!("{}/protolock", CLASSIFIER),
        include_bytes!("fixtures/fake_protolock.sh").to_vec(),
    );
    BinaryProvisioner::new(resources)
}

fn expect_failure(result: proto_compat::Result<GateOutcome>) -> Vec<String> {
    match result {
        Err(GateError::CompatibilityFailure {
            message,
            diagnostics,
        }) => {
            assert_eq!(message, "Backwards compatibility check failed!");
            diagnostics
        }
        other => panic!("Expected CompatibilityFailure, got {:?}", other),
    }
}

#[test]
fn test_init_then_breaking_then_additive() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let project = Project::new();

    // Run 1: pristine project
    project.write_proto("init.proto");
    assert_eq!(project.run().unwrap(), GateOutcome::Initialized);
    assert!(project.lock_file().exists());
    assert!(project.root().join("target/protolock-bin/protolock").exists());

    // Run 2: wire type change
    project.write_proto("bad.proto");
    let diagnostics = expect_failure(project.run());
    assert!(
        diagnostics.iter().any(|l| l.contains("\"a\"")),
        "diagnostics should name field a: {:?}",
        diagnostics
    );

    // Run 3: purely additive change
    project.write_proto("good.proto");
    assert_eq!(project.run().unwrap(), GateOutcome::Passed);
    let baseline = fs::read_to_string(project.lock_file()).unwrap();
    assert!(baseline.contains("string b = 2;"));

    // The refreshed baseline still passes
    assert_eq!(project.run().unwrap(), GateOutcome::Passed);
}

#[test]
fn test_deleting_lock_accepts_breaking_change() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let project = Project::new();

    project.write_proto("init.proto");
    assert_eq!(project.run().unwrap(), GateOutcome::Initialized);

    project.write_proto("bad.proto");
    expect_failure(project.run());

    fs::remove_file(project.lock_file()).unwrap();
    assert_eq!(project.run().unwrap(), GateOutcome::Initialized);
    assert_eq!(project.run().unwrap(), GateOutcome::Passed);
}

#[test]
fn test_allow_breaking_changes() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut project = Project::new();
    project.config.check.allow_breaking_changes = true;

    project.write_proto("init.proto");
    project.run().unwrap();
    project.write_proto("bad.proto");

    match project.run().unwrap() {
        GateOutcome::BreakingAllowed { diagnostics } => {
            assert!(diagnostics.iter().any(|l| l.contains("CONFLICT")));
        }
        other => panic!("Expected BreakingAllowed, got {:?}", other),
    }
    // Failed status never commits, so the old baseline is kept
    let baseline = fs::read_to_string(project.lock_file()).unwrap();
    assert!(baseline.contains("string a = 1;"));
}

#[test]
fn test_separate_lock_dir() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut project = Project::new();
    project.config.check.lock_dir = Some(PathBuf::from("locks"));
    fs::create_dir_all(project.root().join("locks")).unwrap();

    project.write_proto("init.proto");
    assert_eq!(project.run().unwrap(), GateOutcome::Initialized);
    assert!(project.root().join("locks/proto.lock").exists());
    assert!(!project.lock_file().exists());
}

#[test]
fn test_lockdir_option_rejected_for_any_proto_root() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    for root in ["src/main/proto", "does/not/exist"] {
        let mut project = Project::new();
        project.config.check.proto_source_root = PathBuf::from(root);
        project.config.check.options = Some("--lockdir=elsewhere".to_string());

        let err = project.config.validate(project.root()).unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
        assert!(!project.root().join("target/protolock-bin").exists());
    }
}

#[test]
fn test_coordinate_plugin_runs_from_plugin_dir() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut project = Project::new();

    let artifact_dir = project.root().join("repo/com/example/sample-plugin/1.0.0");
    fs::create_dir_all(&artifact_dir).unwrap();
    fs::copy(
        fixtures().join("sample_plugin.sh"),
        artifact_dir.join("sample-plugin-1.0.0.exe"),
    )
    .unwrap();
    project.config.plugins.specs = vec!["com.example:sample-plugin:1.0.0".to_string()];

    // Init ignores plugins
    project.write_proto("init.proto");
    assert_eq!(project.run().unwrap(), GateOutcome::Initialized);
    assert!(project
        .root()
        .join("target/protolock-plugins/sample-plugin-1.0.0.exe")
        .exists());

    // The sample plugin always reports errors
    let diagnostics = expect_failure(project.run());
    assert_eq!(
        diagnostics,
        vec![
            "[sample] A sample warning!",
            "[sample] Another sample warning.. ah!"
        ]
    );
}

#[test]
fn test_missing_plugin_version_names_spec() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut project = Project::new();
    project.config.plugins.specs = vec!["com.example:sample-plugin:0.0.0-missing".to_string()];
    project.write_proto("init.proto");

    match project.run() {
        Err(GateError::PluginResolution { spec, .. }) => {
            assert_eq!(spec, "com.example:sample-plugin:0.0.0-missing");
        }
        other => panic!("Expected PluginResolution, got {:?}", other),
    }
    assert!(!project.lock_file().exists());
}
