//! Shared, append-only buffer for remote process output.
//!
//! The transport task appends while the caller reads snapshots. Pattern
//! searches only look at the last `search_depth` bytes, which keeps prompt
//! detection cheap when the CLI has produced a lot of output.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use regex::bytes::Regex;
use tokio::sync::Notify;
use vte::{Parser, Perform};

use crate::error::{ChannelError, Result};

/// Printable text left after escape sequences are removed.
struct PlainText {
    data: BytesMut,
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.data.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if byte == b'\n' || byte == b'\t' {
            self.data.extend_from_slice(&[byte]);
        }
    }
}

/// Parser state lives next to the text so a sequence or a UTF-8 character
/// split across two packets is still decoded as one.
struct Captured {
    parser: Parser,
    text: PlainText,
}

struct Inner {
    captured: Mutex<Captured>,
    appended: Notify,
    search_depth: usize,
}

/// Cloneable handle to the accumulated output of one remote process.
///
/// All clones share the same storage. The buffer is never cleared.
#[derive(Clone)]
pub struct OutputBuffer {
    inner: Arc<Inner>,
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.len())
            .field("search_depth", &self.inner.search_depth)
            .finish()
    }
}

impl OutputBuffer {
    /// Create a buffer searching the last `search_depth` bytes for patterns.
    pub fn new(search_depth: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                captured: Mutex::new(Captured {
                    parser: Parser::new(),
                    text: PlainText {
                        data: BytesMut::with_capacity(4096),
                    },
                }),
                appended: Notify::new(),
                search_depth,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.inner
            .captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append output, stripping ANSI escape codes.
    ///
    /// Chunks may end anywhere; an incomplete escape sequence or UTF-8
    /// character is held back until the next call completes it.
    pub fn extend(&self, data: &[u8]) {
        {
            let mut guard = self.lock();
            let captured = &mut *guard;
            captured.parser.advance(&mut captured.text, data);
        }
        self.inner.appended.notify_waiters();
    }

    /// Copy of everything captured so far.
    pub fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.lock().text.data).into_owned()
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.lock().text.data.len()
    }

    /// Whether nothing has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.lock().text.data.is_empty()
    }

    /// Search depth setting.
    pub fn search_depth(&self) -> usize {
        self.inner.search_depth
    }

    /// Check if the tail of the buffer matches `pattern`.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        let captured = self.lock();
        let data = &captured.text.data;
        let start = data.len().saturating_sub(self.inner.search_depth);
        pattern.is_match(&data[start..])
    }

    /// Check if anything in the buffer matches `pattern`.
    ///
    /// Prefer [`tail_contains`](Self::tail_contains) for prompt detection.
    pub fn contains(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.lock().text.data)
    }

    /// Wait until the buffer tail matches `pattern`.
    pub async fn wait_for(&self, pattern: &Regex, timeout: Duration) -> Result<()> {
        let wait = async {
            loop {
                let notified = self.inner.appended.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.tail_contains(pattern) {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ChannelError::PatternTimeout(timeout).into())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let buffer = OutputBuffer::new(100);
        buffer.extend(b"Obtaining JSON from switch...\n");
        buffer.extend(b"Done\n");
        assert_eq!(buffer.snapshot(), "Obtaining JSON from switch...\nDone\n");
    }

    #[test]
    fn test_ansi_stripping() {
        let buffer = OutputBuffer::new(100);
        buffer.extend(b"\x1b[32mRuntimeCmd: \x1b[0m");
        assert_eq!(buffer.snapshot(), "RuntimeCmd: ");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let buffer = OutputBuffer::new(100);
        buffer.extend(b"RuntimeCmd: \x1b[3");
        buffer.extend(b"2mDone\n");
        assert_eq!(buffer.snapshot(), "RuntimeCmd: Done\n");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let buffer = OutputBuffer::new(100);
        let bytes = "é".as_bytes();
        buffer.extend(&bytes[..1]);
        assert!(buffer.is_empty());
        buffer.extend(&bytes[1..]);
        assert_eq!(buffer.snapshot(), "é");
    }

    #[test]
    fn test_keeps_tabs_drops_carriage_returns() {
        let buffer = OutputBuffer::new(100);
        buffer.extend(b"r0\t5\r\n");
        assert_eq!(buffer.snapshot(), "r0\t5\n");
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = OutputBuffer::default();
        let writer = buffer.clone();
        writer.extend(b"Control utility for runtime P4 table manipulation\n");
        assert!(!buffer.is_empty());
        assert_eq!(buffer.len(), writer.len());
    }

    #[test]
    fn test_snapshot_is_non_destructive() {
        let buffer = OutputBuffer::default();
        buffer.extend(b"abc");
        assert_eq!(buffer.snapshot(), "abc");
        assert_eq!(buffer.snapshot(), "abc");
    }

    #[test]
    fn test_tail_search_not_in_tail() {
        let buffer = OutputBuffer::new(10);
        buffer.extend(b"RuntimeCmd: ");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"RuntimeCmd:").unwrap();
        assert!(!buffer.tail_contains(&pattern));
        assert!(buffer.contains(&pattern));
    }

    #[tokio::test]
    async fn test_wait_for_sees_later_output() {
        let buffer = OutputBuffer::default();
        let writer = buffer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.extend(b"Adding entry to exact match table t1\nRuntimeCmd: ");
        });

        let prompt = Regex::new(r"RuntimeCmd:\s*$").unwrap();
        tokio_test::assert_ok!(buffer.wait_for(&prompt, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let buffer = OutputBuffer::default();
        let prompt = Regex::new(r"RuntimeCmd:").unwrap();
        let err = buffer
            .wait_for(&prompt, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Channel(ChannelError::PatternTimeout(_))
        ));
    }
}
