//! Shared E2E test helpers for `dronecfg` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Settings variables that would leak the developer's environment into tests.
const SETTINGS_VARS: &[&str] = &[
    "DRONECFG_CONFIG_DIR",
    "DRONECFG_SEARCH_PATH",
    "DRONECFG_FORMAT",
    "DRONECFG_SORT_KEYS",
    "RUST_LOG",
];

/// The `omnidrones` fixture tree shared with the runtime crate's tests.
pub fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../dronecfg-runtime/tests/fixtures/omnidrones")
}

pub fn train_yaml() -> String {
    fixtures()
        .join("scripts/train.yaml")
        .to_str()
        .expect("valid utf8")
        .to_string()
}

/// Build a Command for the `dronecfg` binary isolated from global settings.
///
/// `HOME` points at a fresh temp dir so `~/.dronecfg/config.toml` is never
/// read; `-C` points the project root at the same dir. Returns
/// (command, guard); keep the guard alive for the test's duration.
pub fn dronecfg_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let home = tempfile::tempdir().expect("create temp home dir");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("dronecfg");
    cmd.timeout(TIMEOUT);
    for var in SETTINGS_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home.path());
    cmd.args(["-C", home.path().to_str().expect("valid utf8")]);
    (cmd, home)
}

/// Writes `<dir>/.dronecfg/config.toml`.
pub fn write_settings(dir: &Path, content: &str) {
    let settings_dir = dir.join(".dronecfg");
    std::fs::create_dir_all(&settings_dir).expect("create settings dir");
    std::fs::write(settings_dir.join("config.toml"), content).expect("write settings");
}
