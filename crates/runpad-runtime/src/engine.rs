//! Code execution against a loaded runtime.
//!
//! # Protocol
//!
//! ```text
//! execute(handle, source)
//!   1. lock handle                    (one run per instance at a time)
//!   2. bind fresh OutputChannel       (nothing from earlier runs survives)
//!   3. run source, polling Interrupt  (cancel token, deadline, budget)
//!   4. detach channel, drain it
//!   5. classify → ExecutionResult     (always terminal, never Err)
//! ```
//!
//! The async entry points run steps 1-5 on tokio's blocking pool so a long
//! program never stalls the caller's executor.

use crate::error::LoadError;
use crate::handle::{Interrupt, InterruptReason, RuntimeFault, RuntimeHandle};
use crate::output::OutputChannel;
use crate::util::panic_message;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Message used when a fault carries no description.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while executing the code.";

/// Default execution deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on captured output.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Bootstrap artifact unreachable or failed to load.
    ScriptInjection,
    /// Runtime factory raised during instantiation.
    FactoryInvocation,
    /// The user's source faulted.
    Execution,
    /// Unexpected or undescribed fault.
    Internal,
    /// The execution deadline passed.
    Timeout,
    /// The caller cancelled the execution.
    Cancelled,
    /// An instruction or memory budget was exhausted.
    LimitExceeded,
}

impl FailureKind {
    /// Stable name used in rendered output and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScriptInjection => "ScriptInjectionError",
            Self::FactoryInvocation => "FactoryInvocationError",
            Self::Execution => "ExecutionError",
            Self::Internal => "InternalError",
            Self::Timeout => "TimeoutError",
            Self::Cancelled => "CancelledError",
            Self::LimitExceeded => "LimitExceededError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The program ran to completion.
    Success {
        /// Everything the program wrote to standard output.
        output: String,
    },
    /// The program (or runtime acquisition) failed.
    Failure {
        /// Failure classification.
        kind: FailureKind,
        /// Human-readable description.
        message: String,
        /// Output written before the fault.
        output: String,
    },
}

impl ExecutionResult {
    /// Creates a success result.
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success {
            output: output.into(),
        }
    }

    /// Creates a failure result with no captured output.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            output: String::new(),
        }
    }

    /// Converts a loader error into a failure result.
    #[must_use]
    pub fn from_load_error(err: &LoadError) -> Self {
        let kind = match err {
            LoadError::ScriptInjection(_) => FailureKind::ScriptInjection,
            LoadError::FactoryInvocation(_) => FailureKind::FactoryInvocation,
        };
        Self::failure(kind, err.to_string())
    }

    /// Returns `true` for [`ExecutionResult::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Captured output (partial output for failures).
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            Self::Success { output } | Self::Failure { output, .. } => output,
        }
    }

    /// Failure kind, if any.
    #[must_use]
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }
}

/// Resource limits applied to every execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall-clock deadline. `None` disables it.
    pub timeout: Option<Duration>,
    /// Instruction budget enforced by the runtime. `None` disables it.
    pub max_instructions: Option<u64>,
    /// Captured output cap in bytes. `None` keeps everything.
    pub max_output_bytes: Option<usize>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            max_instructions: None,
            max_output_bytes: Some(DEFAULT_MAX_OUTPUT_BYTES),
        }
    }
}

impl ExecutionLimits {
    /// Limits with every bound disabled.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            timeout: None,
            max_instructions: None,
            max_output_bytes: None,
        }
    }
}

/// Runs source text against a [`RuntimeHandle`].
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    limits: ExecutionLimits,
}

impl ExecutionEngine {
    /// Creates an engine with the given limits.
    #[must_use]
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    /// Configured limits.
    #[must_use]
    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Executes `source` on the blocking pool.
    pub async fn execute(&self, handle: &RuntimeHandle, source: &str) -> ExecutionResult {
        self.execute_with_cancel(handle, source, CancellationToken::new())
            .await
    }

    /// Executes `source` on the blocking pool, stopping when `cancel` fires.
    ///
    /// Dropping the returned future also cancels the run.
    pub async fn execute_with_cancel(
        &self,
        handle: &RuntimeHandle,
        source: &str,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let run_token = cancel.child_token();
        let _cancel_on_drop = run_token.clone().drop_guard();

        let engine = self.clone();
        let handle = handle.clone();
        let source = source.to_owned();

        match tokio::task::spawn_blocking(move || {
            engine.execute_blocking(&handle, &source, run_token)
        })
        .await
        {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "Execution worker failed");
                ExecutionResult::failure(
                    FailureKind::Internal,
                    format!("execution worker failed: {err}"),
                )
            }
        }
    }

    /// Executes `source` on the calling thread.
    ///
    /// Blocks until the run finishes, the deadline passes, or `cancel`
    /// fires.
    pub fn execute_blocking(
        &self,
        handle: &RuntimeHandle,
        source: &str,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let channel = match self.limits.max_output_bytes {
            Some(limit) => OutputChannel::with_limit(limit),
            None => OutputChannel::new(),
        };

        let started = Instant::now();
        let outcome = {
            let mut runtime = handle.lock();
            let interrupt = self.interrupt(cancel);
            runtime.bind_output(channel.clone());
            let outcome = catch_unwind(AssertUnwindSafe(|| runtime.run(source, &interrupt)));
            // Detach so late writes cannot reach a harvested channel.
            runtime.bind_output(OutputChannel::new());
            outcome
        };

        let truncated = channel.is_truncated();
        let mut output = channel.drain();
        if truncated {
            if let Some(limit) = self.limits.max_output_bytes {
                output.push_str(&truncation_notice(limit));
            }
        }

        let result = match outcome {
            Ok(Ok(())) => ExecutionResult::Success { output },
            Ok(Err(fault)) => classify(fault, output),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(panic = %msg, "Runtime panicked during execution");
                ExecutionResult::Failure {
                    kind: FailureKind::Internal,
                    message: format!("runtime panicked: {msg}"),
                    output,
                }
            }
        };

        debug!(
            runtime = handle.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            kind = result.kind().map_or("Success", |k| k.as_str()),
            output_bytes = result.output().len(),
            truncated,
            "Execution finished"
        );
        result
    }

    fn interrupt(&self, cancel: CancellationToken) -> Interrupt {
        let mut interrupt = Interrupt::new(cancel);
        if let Some(timeout) = self.limits.timeout {
            interrupt = interrupt.with_timeout(timeout);
        }
        if let Some(max) = self.limits.max_instructions {
            interrupt = interrupt.with_instruction_budget(max);
        }
        interrupt
    }
}

fn truncation_notice(limit: usize) -> String {
    format!("\n... output truncated ({limit} byte limit)\n")
}

/// Maps a runtime fault to a failure result, keeping partial output.
fn classify(fault: RuntimeFault, output: String) -> ExecutionResult {
    let (kind, message) = match fault {
        RuntimeFault::Syntax(msg) | RuntimeFault::Raised(Some(msg)) if !msg.trim().is_empty() => {
            (FailureKind::Execution, msg)
        }
        RuntimeFault::Syntax(_) | RuntimeFault::Raised(_) => {
            (FailureKind::Internal, GENERIC_FAILURE_MESSAGE.to_string())
        }
        RuntimeFault::Interrupted(reason) => {
            let kind = match reason {
                InterruptReason::Cancelled => FailureKind::Cancelled,
                InterruptReason::Timeout(_) => FailureKind::Timeout,
                InterruptReason::InstructionLimit(_) => FailureKind::LimitExceeded,
            };
            (kind, reason.to_string())
        }
        RuntimeFault::LimitExceeded(msg) => (FailureKind::LimitExceeded, msg),
    };
    ExecutionResult::Failure {
        kind,
        message,
        output,
    }
}
