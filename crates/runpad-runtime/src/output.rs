//! Per-execution capture buffer for a runtime's standard output.
//!
//! An [`OutputChannel`] is a cheap, cloneable handle onto a single buffer.
//! The execution engine creates a fresh channel for every run and binds it
//! into the runtime, so text written by one run can never show up in the
//! result of another, even when several engines share one process.
//!
//! # Example
//!
//! ```
//! use runpad_runtime::OutputChannel;
//!
//! let channel = OutputChannel::new();
//! let writer = channel.clone();
//! writer.write("hello\n");
//!
//! assert_eq!(channel.drain(), "hello\n");
//! assert_eq!(channel.drain(), "");
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Buffer {
    text: String,
    limit: Option<usize>,
    truncated: bool,
}

/// Shared capture buffer for runtime output.
#[derive(Debug, Clone, Default)]
pub struct OutputChannel {
    inner: Arc<Mutex<Buffer>>,
}

impl OutputChannel {
    /// Creates an unbounded channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel that keeps at most `limit` bytes.
    ///
    /// Writes past the limit are dropped and the channel is marked
    /// truncated.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buffer {
                limit: Some(limit),
                ..Buffer::default()
            })),
        }
    }

    /// Discards any buffered text and clears the truncation flag.
    pub fn reset(&self) {
        let mut buf = self.inner.lock();
        buf.text.clear();
        buf.truncated = false;
    }

    /// Appends text to the buffer, honouring the byte limit.
    pub fn write(&self, text: &str) {
        let mut buf = self.inner.lock();
        let Some(limit) = buf.limit else {
            buf.text.push_str(text);
            return;
        };

        let room = limit.saturating_sub(buf.text.len());
        if text.len() <= room {
            buf.text.push_str(text);
        } else {
            let cut = floor_char_boundary(text, room);
            buf.text.push_str(&text[..cut]);
            buf.truncated = true;
        }
    }

    /// Takes the buffered text, leaving the channel empty.
    #[must_use]
    pub fn drain(&self) -> String {
        let mut buf = self.inner.lock();
        buf.truncated = false;
        std::mem::take(&mut buf.text)
    }

    /// Returns `true` if output was dropped since the last reset/drain.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.inner.lock().truncated
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().text.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if both handles point at the same buffer.
    #[must_use]
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Largest index `<= max` that lies on a UTF-8 boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_drain() {
        let ch = OutputChannel::new();
        ch.write("a");
        ch.write("b\n");
        assert_eq!(ch.len(), 3);
        assert_eq!(ch.drain(), "ab\n");
        assert!(ch.is_empty());
    }

    #[test]
    fn reset_discards_content() {
        let ch = OutputChannel::new();
        ch.write("stale");
        ch.reset();
        assert_eq!(ch.drain(), "");
    }

    #[test]
    fn clones_share_buffer() {
        let ch = OutputChannel::new();
        let writer = ch.clone();
        writer.write("shared");
        assert!(ch.same_channel(&writer));
        assert_eq!(ch.drain(), "shared");
    }

    #[test]
    fn fresh_channels_are_isolated() {
        let first = OutputChannel::new();
        let second = OutputChannel::new();
        first.write("one");
        assert!(!first.same_channel(&second));
        assert_eq!(second.drain(), "");
    }

    #[test]
    fn limit_truncates_and_flags() {
        let ch = OutputChannel::with_limit(5);
        ch.write("abc");
        ch.write("defgh");
        assert!(ch.is_truncated());
        assert_eq!(ch.drain(), "abcde");
        assert!(!ch.is_truncated());
    }

    #[test]
    fn limit_respects_char_boundaries() {
        let ch = OutputChannel::with_limit(4);
        // "é" is two bytes; cutting at 4 would split the second one.
        ch.write("aéé");
        assert!(ch.is_truncated());
        assert_eq!(ch.drain(), "aé");
    }

    #[test]
    fn writes_after_limit_are_dropped() {
        let ch = OutputChannel::with_limit(2);
        ch.write("ab");
        assert!(!ch.is_truncated());
        ch.write("c");
        assert!(ch.is_truncated());
        assert_eq!(ch.drain(), "ab");
    }
}
