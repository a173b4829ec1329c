//! Single-flight runtime acquisition.
//!
//! # State Machine
//!
//! ```text
//!              acquire()              success
//! Unloaded ─────────────▶ Loading ─────────────▶ Ready (reused forever)
//!                           │  ▲
//!                   failure │  │ acquire()
//!                           ▼  │
//!                          Failed
//! ```
//!
//! While an attempt is in flight every caller awaits the same shared
//! future, so the provider's bootstrap and the factory run exactly once per
//! attempt no matter how many callers are waiting. A failed attempt is
//! reported to all of its waiters; the next `acquire()` starts over.

use crate::error::LoadError;
use crate::handle::RuntimeHandle;
use crate::provider::RuntimeProvider;
use crate::util::panic_message;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Observable loader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No attempt has been made (or the runtime was explicitly unloaded).
    Unloaded,
    /// An attempt is in flight.
    Loading,
    /// A runtime handle is cached.
    Ready,
    /// The last attempt failed; the next `acquire()` retries.
    Failed,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

type Attempt = Shared<BoxFuture<'static, Result<RuntimeHandle, LoadError>>>;

enum Slot {
    Unloaded,
    Loading { id: u64, attempt: Attempt },
    Ready(RuntimeHandle),
    Failed(LoadError),
}

/// Acquires and memoizes a single runtime instance.
///
/// Share one loader per process through an `Arc`; every clone of the
/// returned [`RuntimeHandle`] points at the same instance.
pub struct RuntimeLoader {
    provider: Arc<dyn RuntimeProvider>,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
}

impl RuntimeLoader {
    /// Creates a loader backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn RuntimeProvider>) -> Self {
        Self {
            provider,
            slot: Mutex::new(Slot::Unloaded),
            attempts: AtomicU64::new(0),
        }
    }

    /// Returns the runtime handle, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ScriptInjection`] if the bootstrap artifact could
    /// not be loaded, or [`LoadError::FactoryInvocation`] if the factory
    /// failed to create an instance.
    pub async fn acquire(&self) -> Result<RuntimeHandle, LoadError> {
        let (id, attempt) = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Loading { id, attempt } => {
                    debug!(attempt = id, "Joining in-flight runtime load");
                    (*id, attempt.clone())
                }
                Slot::Unloaded | Slot::Failed(_) => {
                    let id = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(attempt = id, "Loading runtime");
                    let attempt = bootstrap(Arc::clone(&self.provider)).boxed().shared();
                    *slot = Slot::Loading {
                        id,
                        attempt: attempt.clone(),
                    };
                    (id, attempt)
                }
            }
        };

        let result = attempt.await;
        self.settle(id, &result);
        result
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        match &*self.slot.lock() {
            Slot::Unloaded => LoadState::Unloaded,
            Slot::Loading { .. } => LoadState::Loading,
            Slot::Ready(_) => LoadState::Ready,
            Slot::Failed(_) => LoadState::Failed,
        }
    }

    /// Returns the cached handle without loading.
    #[must_use]
    pub fn handle(&self) -> Option<RuntimeHandle> {
        match &*self.slot.lock() {
            Slot::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Returns the error of the last attempt while in [`LoadState::Failed`].
    #[must_use]
    pub fn last_error(&self) -> Option<LoadError> {
        match &*self.slot.lock() {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Number of load attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Explicitly discards a Ready runtime.
    ///
    /// Returns `true` if a handle was dropped. An in-flight attempt is left
    /// alone. Outstanding clones of the handle stay usable; the next
    /// `acquire()` creates a new instance.
    pub fn unload(&self) -> bool {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Ready(_) | Slot::Failed(_) => {
                let was_ready = matches!(&*slot, Slot::Ready(_));
                *slot = Slot::Unloaded;
                if was_ready {
                    info!("Runtime unloaded");
                }
                was_ready
            }
            Slot::Unloaded | Slot::Loading { .. } => false,
        }
    }

    /// Records the outcome of attempt `id` unless a newer one took over.
    fn settle(&self, id: u64, result: &Result<RuntimeHandle, LoadError>) {
        let mut slot = self.slot.lock();
        let current = matches!(&*slot, Slot::Loading { id: current, .. } if *current == id);
        if !current {
            return;
        }
        *slot = match result {
            Ok(handle) => {
                info!(attempt = id, runtime = handle.name(), "Runtime ready");
                Slot::Ready(handle.clone())
            }
            Err(err) => {
                warn!(attempt = id, error = %err, "Runtime load failed");
                Slot::Failed(err.clone())
            }
        };
    }
}

impl std::fmt::Debug for RuntimeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeLoader")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

/// One load attempt: find or inject the factory, then invoke it once.
async fn bootstrap(provider: Arc<dyn RuntimeProvider>) -> Result<RuntimeHandle, LoadError> {
    let attempt = async move {
        let factory = match provider.registered_factory() {
            Some(factory) => {
                debug!("Runtime factory already registered");
                factory
            }
            None => {
                debug!("Injecting runtime bootstrap artifact");
                provider
                    .inject_bootstrap()
                    .await
                    .map_err(|e| LoadError::ScriptInjection(e.to_string()))?
            }
        };

        let runtime = factory
            .instantiate()
            .await
            .map_err(|e| LoadError::FactoryInvocation(e.to_string()))?;

        Ok(RuntimeHandle::new(runtime))
    };

    match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(LoadError::FactoryInvocation(format!(
            "runtime bootstrap panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}
