//! Process-wide Ctrl+C relay.
//!
//! tokio installs its SIGINT handler on the first `ctrl_c()` call and keeps
//! it for the rest of the process, after which the default "terminate" action
//! is gone. One task therefore owns the signal and hands each press to
//! whoever is listening: a running program gets cancelled, the idle editor
//! ends the session. A press nobody listens for exits with
//! [`EXIT_CANCELLED`], as the default action would have.

use crate::commands::EXIT_CANCELLED;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle onto the Ctrl+C relay.
#[derive(Debug, Clone, Default)]
pub struct CtrlC {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    listeners: AtomicUsize,
    notify: Notify,
}

/// Counts a listener for as long as it is alive.
struct Listening<'a>(&'a Inner);

impl<'a> Listening<'a> {
    fn new(inner: &'a Inner) -> Self {
        inner.listeners.fetch_add(1, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for Listening<'_> {
    fn drop(&mut self) {
        self.0.listeners.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CtrlC {
    /// Takes over SIGINT and starts relaying presses.
    #[must_use]
    pub fn install() -> Self {
        let relay = Self::default();
        let task = relay.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !task.press() {
                    tracing::debug!("Ctrl+C with no listener, exiting");
                    std::process::exit(EXIT_CANCELLED);
                }
            }
        });
        relay
    }

    /// Resolves on the next press.
    pub async fn pressed(&self) {
        // A `Notified` sees `notify_waiters` from creation, before its first poll.
        let notified = self.inner.notify.notified();
        let _listening = Listening::new(&self.inner);
        notified.await;
    }

    /// Delivers one press. Returns `false` if nobody was listening.
    fn press(&self) -> bool {
        if self.inner.listeners.load(Ordering::SeqCst) == 0 {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }
}
