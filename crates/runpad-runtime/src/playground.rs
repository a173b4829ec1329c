//! The `execute code` entry point used by front ends.
//!
//! [`Playground`] glues a shared [`RuntimeLoader`] to an
//! [`ExecutionEngine`] and guarantees that every call ends in an
//! [`ExecutionResult`]: loader failures, cancellation while waiting for the
//! runtime, and runtime faults all come back as text to display.

use crate::engine::{ExecutionEngine, ExecutionLimits, ExecutionResult, FailureKind};
use crate::error::LoadError;
use crate::handle::{InterruptReason, RuntimeHandle};
use crate::loader::{LoadState, RuntimeLoader};
use crate::provider::RuntimeProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Front-end facade over loader and engine.
#[derive(Debug, Clone)]
pub struct Playground {
    loader: Arc<RuntimeLoader>,
    engine: ExecutionEngine,
}

impl Playground {
    /// Creates a playground over an existing (possibly shared) loader.
    #[must_use]
    pub fn new(loader: Arc<RuntimeLoader>, engine: ExecutionEngine) -> Self {
        Self { loader, engine }
    }

    /// Creates a playground with its own loader.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn RuntimeProvider>, limits: ExecutionLimits) -> Self {
        Self::new(
            Arc::new(RuntimeLoader::new(provider)),
            ExecutionEngine::new(limits),
        )
    }

    /// The shared loader.
    #[must_use]
    pub fn loader(&self) -> &Arc<RuntimeLoader> {
        &self.loader
    }

    /// The execution engine.
    #[must_use]
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Current loader state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.loader.state()
    }

    /// Loads the runtime ahead of the first execution.
    ///
    /// # Errors
    ///
    /// Returns the classified [`LoadError`] if loading fails.
    pub async fn preload(&self) -> Result<RuntimeHandle, LoadError> {
        self.loader.acquire().await
    }

    /// Acquires the runtime and executes `source`.
    pub async fn execute_code(&self, source: &str) -> ExecutionResult {
        self.execute_code_with_cancel(source, CancellationToken::new())
            .await
    }

    /// Like [`execute_code`](Self::execute_code), stopping when `cancel`
    /// fires, including while the runtime is still loading.
    ///
    /// Cancelling during loading does not abort the load itself; other
    /// callers keep waiting on it.
    pub async fn execute_code_with_cancel(
        &self,
        source: &str,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let acquired = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Execution cancelled while waiting for runtime");
                return ExecutionResult::failure(
                    FailureKind::Cancelled,
                    InterruptReason::Cancelled.to_string(),
                );
            }
            acquired = self.loader.acquire() => acquired,
        };

        match acquired {
            Ok(handle) => self.engine.execute_with_cancel(&handle, source, cancel).await,
            Err(err) => ExecutionResult::from_load_error(&err),
        }
    }

    /// Explicitly discards the loaded runtime so the next run starts fresh.
    pub fn reset_runtime(&self) -> bool {
        self.loader.unload()
    }
}
