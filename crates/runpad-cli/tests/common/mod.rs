//! Shared E2E test helpers for the `runpad` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

/// Variables that would leak the developer's environment into a test.
const ENV_VARS: &[&str] = &[
    "RUST_LOG",
    "RUNPAD_DEBUG",
    "RUNPAD_PRELOAD",
    "RUNPAD_LOG_FILE",
    "RUNPAD_LOG_DIR",
    "RUNPAD_TIMEOUT_MS",
    "RUNPAD_MAX_INSTRUCTIONS",
    "RUNPAD_MAX_OUTPUT_BYTES",
    "RUNPAD_MAX_MEMORY_BYTES",
    "RUNPAD_BOOTSTRAP",
    "RUNPAD_HISTORY_FILE",
];

/// Build a Command for `runpad` running inside a fresh temp directory.
///
/// Config files are skipped and the editor history goes into the temp
/// directory. Returns (command, _guard); keep the guard alive for the test.
pub fn runpad_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("runpad");
    cmd.timeout(TIMEOUT_BASIC);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUNPAD_HISTORY_FILE", tmp.path().join("history"));
    cmd.current_dir(tmp.path());
    cmd.arg("--no-config");
    (cmd, tmp)
}
