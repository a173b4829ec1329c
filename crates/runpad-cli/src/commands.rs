//! Non-interactive subcommands: `run`, `eval`, `examples`.
//!
//! Program output goes to stdout untouched; the failure line goes to stderr
//! so scripts can tell them apart.

use crate::ctrl_c::CtrlC;
use anyhow::{bail, Context, Result};
use runpad_lua::snippets;
use runpad_runtime::{ExecutionResult, FailureKind, Playground};
use std::io::Write;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Exit code after a failed execution.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code after Ctrl+C cancelled the execution.
pub const EXIT_CANCELLED: i32 = 130;

/// `"{kind}: {message}"` for failures.
#[must_use]
pub fn failure_line(result: &ExecutionResult) -> Option<String> {
    match result {
        ExecutionResult::Success { .. } => None,
        ExecutionResult::Failure { kind, message, .. } => Some(format!("{kind}: {message}")),
    }
}

/// Maps a result to the process exit code.
#[must_use]
pub fn exit_code(result: &ExecutionResult) -> i32 {
    match result.kind() {
        None => 0,
        Some(FailureKind::Cancelled) => EXIT_CANCELLED,
        Some(_) => EXIT_FAILURE,
    }
}

/// Executes `source`, cancelling on Ctrl+C.
pub async fn execute_interruptible(
    playground: &Playground,
    source: &str,
    ctrl_c: &CtrlC,
) -> ExecutionResult {
    let cancel = CancellationToken::new();
    let run = playground.execute_code_with_cancel(source, cancel.clone());
    tokio::pin!(run);

    loop {
        tokio::select! {
            result = &mut run => return result,
            () = ctrl_c.pressed() => {
                tracing::debug!("Ctrl+C received, cancelling execution");
                cancel.cancel();
            }
        }
    }
}

/// Executes `source` once and prints the outcome. Returns the exit code.
pub async fn execute_once(playground: &Playground, source: &str, ctrl_c: &CtrlC) -> i32 {
    let result = execute_interruptible(playground, source, ctrl_c).await;

    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(result.output().as_bytes());
    let _ = stdout.flush();
    drop(stdout);

    if let Some(line) = failure_line(&result) {
        eprintln!("{line}");
    }
    exit_code(&result)
}

/// `runpad run <FILE>`.
///
/// # Errors
///
/// Fails if the file cannot be read.
pub async fn run_file(playground: &Playground, path: &Path, ctrl_c: &CtrlC) -> Result<i32> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "Running file");
    Ok(execute_once(playground, &source, ctrl_c).await)
}

/// `runpad eval <CODE>`; `-` reads the code from stdin.
///
/// # Errors
///
/// Fails if stdin cannot be read.
pub async fn eval(playground: &Playground, code: &str, ctrl_c: &CtrlC) -> Result<i32> {
    let source = if code == "-" {
        let mut source = String::new();
        tokio::io::stdin()
            .read_to_string(&mut source)
            .await
            .context("cannot read code from stdin")?;
        source
    } else {
        code.to_string()
    };
    Ok(execute_once(playground, &source, ctrl_c).await)
}

/// `runpad examples [NAME]`: the listing, or one snippet's code.
///
/// # Errors
///
/// Fails if `name` matches no snippet.
pub fn examples(name: Option<&str>) -> Result<String> {
    let Some(name) = name else {
        return Ok(list_examples());
    };
    match snippets::find(name) {
        Some(snippet) => Ok(snippet.code.to_string()),
        None => bail!("unknown example '{name}' (available: {})", example_keys()),
    }
}

/// One line per snippet: `key  Title - description`.
#[must_use]
pub fn list_examples() -> String {
    let width = snippets::all()
        .iter()
        .map(|s| s.key.len())
        .max()
        .unwrap_or(0);
    snippets::all()
        .iter()
        .map(|s| format!("{:<width$}  {} - {}\n", s.key, s.title, s.description))
        .collect()
}

fn example_keys() -> String {
    snippets::all()
        .iter()
        .map(|s| s.key)
        .collect::<Vec<_>>()
        .join(", ")
}
