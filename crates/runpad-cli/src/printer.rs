//! Terminal output while the line editor owns the prompt.
//!
//! When the interactive editor is active, anything written straight to the
//! terminal garbles the prompt. [`SharedPrinterSlot`] holds rustyline's
//! `ExternalPrinter` (behind a bounded channel drained by its own thread) so
//! program output and log lines can be printed above the prompt instead.
//!
//! With no printer installed (one-shot commands, non-tty stdin, shutdown)
//! callers fall back to writing directly.

use parking_lot::Mutex;
use rustyline::ExternalPrinter;
use std::io;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;

/// Outcome of [`SharedPrinterSlot::try_print`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintResult {
    /// Queued for display above the prompt.
    Sent,
    /// No printer installed; write directly instead.
    NoPrinter,
    /// Queue full; the message was not queued.
    Dropped,
}

struct QueuedPrinter {
    tx: SyncSender<String>,
}

impl QueuedPrinter {
    const CAPACITY: usize = 256;

    fn spawn(mut printer: Box<dyn ExternalPrinter + Send>) -> io::Result<Self> {
        let (tx, rx) = sync_channel::<String>(Self::CAPACITY);
        std::thread::Builder::new()
            .name("runpad-printer".into())
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    if printer.print(msg).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { tx })
    }
}

/// Cloneable slot shared by the REPL and the tracing terminal writer.
#[derive(Clone, Default)]
pub struct SharedPrinterSlot {
    inner: Arc<Mutex<Option<QueuedPrinter>>>,
}

impl SharedPrinterSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `printer`; later messages go above the prompt.
    ///
    /// If the drain thread cannot be started the slot stays empty and
    /// output keeps going straight to the terminal.
    pub fn set(&self, printer: Box<dyn ExternalPrinter + Send>) {
        match QueuedPrinter::spawn(printer) {
            Ok(queued) => *self.inner.lock() = Some(queued),
            Err(e) => tracing::warn!(error = %e, "Cannot start printer thread"),
        }
    }

    /// Removes the printer; its drain thread exits.
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }

    /// Whether a printer is installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Queues `msg` without blocking.
    pub fn try_print(&self, msg: String) -> PrintResult {
        match &*self.inner.lock() {
            Some(printer) => match printer.tx.try_send(msg) {
                Ok(()) => PrintResult::Sent,
                Err(_) => PrintResult::Dropped,
            },
            None => PrintResult::NoPrinter,
        }
    }
}

impl std::fmt::Debug for SharedPrinterSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPrinterSlot")
            .field("active", &self.is_active())
            .finish()
    }
}
