//! In-memory source being edited in the interactive session.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Initial (and post-`:clear`) buffer content.
pub const TEMPLATE: &str = "-- Write your Lua code here";

/// Errors from saving or loading the buffer.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source text with line-oriented editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    text: String,
}

impl Default for SourceBuffer {
    fn default() -> Self {
        Self {
            text: format!("{TEMPLATE}\n"),
        }
    }
}

impl SourceBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `true` while the buffer holds only the template.
    #[must_use]
    pub fn is_template(&self) -> bool {
        self.text.trim_end() == TEMPLATE
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Replaces the whole buffer.
    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    /// Appends one line.
    pub fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// Resets to the template.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Text with right-aligned line numbers, for display.
    #[must_use]
    pub fn numbered(&self) -> String {
        let width = self.line_count().max(1).to_string().len();
        self.text
            .lines()
            .enumerate()
            .map(|(i, line)| format!("{:>width$} | {line}\n", i + 1))
            .collect()
    }

    /// Writes the buffer to `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Write`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), BufferError> {
        std::fs::write(path, &self.text).map_err(|source| BufferError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replaces the buffer with the contents of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Read`] if the file cannot be read; the buffer
    /// is left unchanged.
    pub fn load(&mut self, path: &Path) -> Result<(), BufferError> {
        let text = std::fs::read_to_string(path).map_err(|source| BufferError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.set(&text);
        Ok(())
    }
}
