//! Runtime abstraction and the shared handle onto a live instance.
//!
//! [`Runtime`] is the seam between the execution core and a concrete
//! embedded interpreter. The core never names an interpreter; it only
//! rebinds output, runs source text, and reads back faults.
//!
//! ```text
//! RuntimeLoader ──creates──▶ RuntimeHandle ──lock──▶ Box<dyn Runtime>
//!                                 │
//!                ExecutionEngine ─┘ (bind_output → run → drain)
//! ```

use crate::output::OutputChannel;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a running program was stopped from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    /// The caller cancelled the execution.
    Cancelled,
    /// The execution deadline passed.
    Timeout(Duration),
    /// The instruction budget was used up.
    InstructionLimit(u64),
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "execution cancelled"),
            Self::Timeout(limit) => {
                write!(f, "execution timed out after {} ms", limit.as_millis())
            }
            Self::InstructionLimit(limit) => {
                write!(f, "instruction limit exceeded ({limit})")
            }
        }
    }
}

/// Cooperative interrupt polled by a runtime while it executes.
///
/// Runtimes call [`Interrupt::check`] periodically (the Lua runtime does so
/// from a VM hook) and abort with [`RuntimeFault::Interrupted`] once it
/// reports a reason.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    cancel: CancellationToken,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    max_instructions: Option<u64>,
}

impl Interrupt {
    /// Creates an interrupt driven by the given cancellation token.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }

    /// Arms a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Sets the instruction budget a runtime should enforce.
    #[must_use]
    pub fn with_instruction_budget(mut self, max: u64) -> Self {
        self.max_instructions = Some(max);
        self
    }

    /// Returns the instruction budget, if any.
    #[must_use]
    pub fn instruction_budget(&self) -> Option<u64> {
        self.max_instructions
    }

    /// Returns the cancellation token behind this interrupt.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the reason execution must stop, if any.
    #[must_use]
    pub fn check(&self) -> Option<InterruptReason> {
        if self.cancel.is_cancelled() {
            return Some(InterruptReason::Cancelled);
        }
        match (self.deadline, self.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Some(InterruptReason::Timeout(timeout))
            }
            _ => None,
        }
    }
}

/// A fault raised by a runtime while executing source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeFault {
    /// The source did not compile.
    #[error("{0}")]
    Syntax(String),

    /// The program raised an error. `None` when the fault carries no
    /// textual description.
    #[error("{}", .0.as_deref().unwrap_or("<no message>"))]
    Raised(Option<String>),

    /// The program was stopped from the outside.
    #[error("{0}")]
    Interrupted(InterruptReason),

    /// A resource limit (memory) was hit.
    #[error("{0}")]
    LimitExceeded(String),
}

/// An embedded interpreter instance.
///
/// Implementations own the interpreter state. All calls happen under the
/// [`RuntimeHandle`] mutex, so a runtime is never driven concurrently.
pub trait Runtime: Send {
    /// Human-readable runtime name (e.g. `"Lua 5.4"`).
    fn name(&self) -> &str;

    /// Redirects the runtime's standard output into `channel`.
    ///
    /// Replaces any previously bound channel.
    fn bind_output(&mut self, channel: OutputChannel);

    /// Runs `source` to completion, polling `interrupt` while it executes.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeFault`] when compilation or execution fails.
    fn run(&mut self, source: &str, interrupt: &Interrupt) -> Result<(), RuntimeFault>;
}

/// Cloneable capability referencing one live runtime instance.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Arc<Mutex<Box<dyn Runtime>>>,
    name: Arc<str>,
}

impl RuntimeHandle {
    /// Wraps a freshly instantiated runtime.
    #[must_use]
    pub fn new(runtime: Box<dyn Runtime>) -> Self {
        let name: Arc<str> = Arc::from(runtime.name());
        Self {
            inner: Arc::new(Mutex::new(runtime)),
            name,
        }
    }

    /// Runtime name captured at creation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if both handles reference the same instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Locks the runtime for exclusive use.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn Runtime>> {
        self.inner.lock()
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("name", &self.name)
            .field("instance", &Arc::as_ptr(&self.inner))
            .finish()
    }
}
