//! E2E tests for the one-shot commands: `run`, `eval`, `examples`.
//!
//! Program output is expected on stdout and the failure line on stderr.

mod common;

use common::runpad_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

// ─── eval ──────────────────────────────────────────────────────────

#[test]
fn eval_prints_program_output() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", "print('Hello, World!')"])
        .assert()
        .success()
        .stdout("Hello, World!\n");
}

#[test]
fn eval_empty_source_succeeds_silently() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", ""]).assert().success().stdout("");
}

#[test]
fn eval_comment_only_source() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", "-- Write your Lua code here"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn eval_syntax_error_exits_with_failure() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", "for i = 1 do"])
        .assert()
        .code(1)
        .stderr(contains("ExecutionError"));
}

#[test]
fn eval_runtime_error_keeps_partial_output() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", "print('before') error('boom', 0)"])
        .assert()
        .code(1)
        .stdout("before\n")
        .stderr(contains("ExecutionError: boom"));
}

#[test]
fn eval_reads_stdin_for_dash() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", "-"])
        .write_stdin("print(6 * 7)\n")
        .assert()
        .success()
        .stdout("42\n");
}

#[test]
fn eval_prelude_helpers_are_available() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", "printf('%d-%s\\n', 7, 'x') print(inspect({1, 2}))"])
        .assert()
        .success()
        .stdout(contains("7-x\n").and(contains("{1, 2}")));
}

#[test]
fn eval_sandbox_hides_os_execute() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["eval", "print(os.execute == nil, io.open == nil)"])
        .assert()
        .success()
        .stdout("true\ttrue\n");
}

// ─── limits ────────────────────────────────────────────────────────

#[test]
fn timeout_flag_stops_infinite_loop() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["--timeout-ms", "200", "eval", "while true do end"])
        .assert()
        .code(1)
        .stderr(contains("TimeoutError"));
}

#[test]
fn instruction_budget_flag() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args([
        "--max-instructions",
        "100000",
        "eval",
        "local n = 0 while true do n = n + 1 end",
    ])
    .assert()
    .code(1)
    .stderr(contains("LimitExceededError"));
}

#[test]
fn output_cap_flag_truncates() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args([
        "--max-output",
        "32",
        "eval",
        "for i = 1, 100 do print('line ' .. i) end",
    ])
    .assert()
    .success()
    .stdout(contains("output truncated (32 byte limit)").and(contains("line 100").not()));
}

#[test]
fn timeout_from_environment() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.env("RUNPAD_TIMEOUT_MS", "200")
        .args(["eval", "while true do end"])
        .assert()
        .code(1)
        .stderr(contains("TimeoutError"));
}

#[test]
fn invalid_environment_value_is_reported() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.env("RUNPAD_TIMEOUT_MS", "soon")
        .args(["eval", "print(1)"])
        .assert()
        .failure()
        .stderr(contains("RUNPAD_TIMEOUT_MS"));
}

// ─── bootstrap ─────────────────────────────────────────────────────

#[test]
fn unreachable_bootstrap_is_script_injection_error() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args([
        "--bootstrap",
        "/nonexistent/runpad/prelude.lua",
        "eval",
        "print(1)",
    ])
    .assert()
    .code(1)
    .stdout("")
    .stderr(contains("ScriptInjectionError"));
}

#[test]
fn custom_bootstrap_file_is_loaded() {
    let (mut cmd, guard) = runpad_cmd();
    let prelude = guard.path().join("prelude.lua");
    std::fs::write(&prelude, "greeting = 'from prelude'\n").expect("write prelude");

    cmd.arg("--bootstrap")
        .arg(&prelude)
        .args(["eval", "print(greeting)"])
        .assert()
        .success()
        .stdout("from prelude\n");
}

#[test]
fn project_config_is_ignored_with_no_config() {
    let (mut cmd, guard) = runpad_cmd();
    let dir = guard.path().join(".runpad");
    std::fs::create_dir_all(&dir).expect("config dir");
    std::fs::write(
        dir.join("config.toml"),
        "[runtime]\nbootstrap = \"/nonexistent/prelude.lua\"\n",
    )
    .expect("write config");

    cmd.args(["eval", "print('ok')"])
        .assert()
        .success()
        .stdout("ok\n");
}

// ─── run ───────────────────────────────────────────────────────────

#[test]
fn run_executes_file() {
    let (mut cmd, guard) = runpad_cmd();
    let script = guard.path().join("demo.lua");
    std::fs::write(&script, "for i = 1, 3 do print(i) end\n").expect("write script");

    cmd.arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout("1\n2\n3\n");
}

#[test]
fn run_missing_file_fails() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["run", "does-not-exist.lua"])
        .assert()
        .failure()
        .stderr(contains("cannot read"));
}

// ─── examples ──────────────────────────────────────────────────────

#[test]
fn examples_lists_snippets() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.arg("examples").assert().success().stdout(
        contains("Hello World")
            .and(contains("For Loop"))
            .and(contains("Fibonacci Sequence")),
    );
}

#[test]
fn examples_prints_one_snippet() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["examples", "loop"])
        .assert()
        .success()
        .stdout(contains("Number: %d"));
}

#[test]
fn unknown_example_fails() {
    let (mut cmd, _guard) = runpad_cmd();
    cmd.args(["examples", "nope"])
        .assert()
        .failure()
        .stderr(contains("unknown example 'nope'"));
}
