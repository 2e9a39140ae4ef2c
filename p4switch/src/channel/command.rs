//! Character stream used as the keyboard input of a remote CLI process.
//!
//! The caller pushes whole command lines with [`CommandStream::write`]; the
//! transport's background task pulls whatever is queued with
//! [`CommandStream::read`]. Every character is queued as its own unit so the
//! two sides never see a partially written line out of order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::{ChannelError, Result};

/// End-of-text control character (Ctrl-C on a PTY).
pub const ETX: char = '\x03';

/// One queued unit of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputUnit {
    Char(char),
    Interrupt,
}

#[derive(Debug, Default)]
struct Queue {
    units: VecDeque<InputUnit>,
    terminate_sent: bool,
    terminate_read: bool,
}

/// Thread-safe, append-only command stream.
///
/// Producer calls may come from any number of call sites; the single consumer
/// is the task forwarding input to the remote PTY. `read` never blocks, use
/// [`readable`](Self::readable) to wait for new input.
#[derive(Debug, Default)]
pub struct CommandStream {
    queue: Mutex<Queue>,
    ready: Notify,
}

impl CommandStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a command, appending a newline if it lacks one.
    ///
    /// Empty input is a no-op. Fails once [`send_terminate`](Self::send_terminate)
    /// has been called.
    pub fn write(&self, command: &str) -> Result<()> {
        if command.is_empty() {
            return Ok(());
        }

        {
            let mut queue = self.lock();
            if queue.terminate_sent {
                return Err(ChannelError::InputClosed.into());
            }
            queue.units.extend(command.chars().map(InputUnit::Char));
            if !command.ends_with('\n') {
                queue.units.push_back(InputUnit::Char('\n'));
            }
        }

        self.ready.notify_one();
        Ok(())
    }

    /// Pop up to `max` queued units (everything when `None`).
    ///
    /// Returns an empty string immediately if nothing is queued.
    pub fn read(&self, max: Option<usize>) -> String {
        let mut queue = self.lock();
        let count = max.map_or(queue.units.len(), |m| m.min(queue.units.len()));

        let mut out = String::with_capacity(count);
        let mut saw_interrupt = false;
        for unit in queue.units.drain(..count) {
            match unit {
                InputUnit::Char(c) => out.push(c),
                InputUnit::Interrupt => {
                    out.push(ETX);
                    saw_interrupt = true;
                }
            }
        }
        if saw_interrupt {
            queue.terminate_read = true;
        }
        out
    }

    /// Queue the end-of-input signal.
    ///
    /// Only the first call enqueues anything; returns whether this call did.
    pub fn send_terminate(&self) -> bool {
        {
            let mut queue = self.lock();
            if queue.terminate_sent {
                return false;
            }
            queue.terminate_sent = true;
            queue.units.push_back(InputUnit::Interrupt);
        }

        self.ready.notify_one();
        true
    }

    /// Wait until something has been queued since the last wakeup.
    pub async fn readable(&self) {
        if !self.is_empty() {
            return;
        }
        self.ready.notified().await;
    }

    /// Number of units still queued.
    pub fn len(&self) -> usize {
        self.lock().units.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().units.is_empty()
    }

    /// Whether the terminate signal has been sent.
    pub fn is_terminated(&self) -> bool {
        self.lock().terminate_sent
    }

    /// Whether the reader has consumed the terminate signal.
    pub fn is_finished(&self) -> bool {
        self.lock().terminate_read
    }
}
