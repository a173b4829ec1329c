//! Tracing writers for the terminal and file log layers.
//!
//! - [`TerminalMakeWriter`]: prints above the editor prompt through the
//!   [`SharedPrinterSlot`], or writes to stderr when no printer is installed
//!   so that stdout only ever carries program output.
//! - [`FileMakeWriter`]: appends to `runpad.log`. Build its layer with
//!   `.with_ansi(false)`.

use crate::printer::{PrintResult, SharedPrinterSlot};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// [`MakeWriter`](tracing_subscriber::fmt::MakeWriter) for the terminal layer.
#[derive(Clone)]
pub struct TerminalMakeWriter {
    slot: SharedPrinterSlot,
}

impl TerminalMakeWriter {
    pub fn new(slot: &SharedPrinterSlot) -> Self {
        Self { slot: slot.clone() }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for TerminalMakeWriter {
    type Writer = TerminalWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TerminalWriter {
            slot: self.slot.clone(),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and emits it on drop.
pub struct TerminalWriter {
    slot: SharedPrinterSlot,
    buf: Vec<u8>,
}

impl Write for TerminalWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TerminalWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }

        let msg = String::from_utf8_lossy(&self.buf).into_owned();
        match self.slot.try_print(msg) {
            PrintResult::Sent | PrintResult::Dropped => {}
            PrintResult::NoPrinter => {
                let mut stderr = io::stderr().lock();
                let _ = stderr.write_all(&self.buf);
                let _ = stderr.flush();
            }
        }
    }
}

/// [`MakeWriter`](tracing_subscriber::fmt::MakeWriter) for the file layer.
#[derive(Clone)]
pub struct FileMakeWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl FileMakeWriter {
    pub fn new(file: Arc<Mutex<std::fs::File>>) -> Self {
        Self { file }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileMakeWriter {
    type Writer = FileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriter {
            file: Arc::clone(&self.file),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and appends it to the log file on drop.
pub struct FileWriter {
    file: Arc<Mutex<std::fs::File>>,
    buf: Vec<u8>,
}

impl Write for FileWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }

        let mut file = self.file.lock();
        let _ = file.write_all(&self.buf);
        let _ = file.flush();
    }
}
