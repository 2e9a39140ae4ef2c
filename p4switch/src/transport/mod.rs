//! SSH transport layer wrapping russh.
//!
//! [`RemoteShell`] is the seam between sessions and the wire: it connects,
//! starts interactive processes, runs one-shot commands and uploads files.
//! [`SshTransport`] is the russh implementation.

pub mod config;
#[cfg(test)]
pub(crate) mod mock;
mod pump;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::channel::{CommandStream, OutputBuffer};
use crate::error::{ChannelError, Result};

/// Operations a switch backend needs from a remote host.
pub trait RemoteShell: Sized + Send + Sync + 'static {
    /// Connect and authenticate.
    fn connect(config: &SshConfig) -> impl Future<Output = Result<Self>> + Send;

    /// Start `command` under a PTY, reading input from `input` and appending
    /// everything it prints to `output`.
    ///
    /// Returns as soon as the process has been started.
    fn spawn_interactive(
        &self,
        command: &str,
        input: Arc<CommandStream>,
        output: OutputBuffer,
    ) -> impl Future<Output = Result<RemoteProcess>> + Send;

    /// Run `command` to completion and capture its output.
    fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ExecOutput>> + Send;

    /// Write `contents` to `path` on the remote host.
    fn upload(&self, path: &str, contents: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection.
    fn disconnect(self) -> impl Future<Output = Result<()>> + Send;
}

/// Captured output of a one-shot remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output (lossy UTF-8).
    pub stdout: String,

    /// Standard error (lossy UTF-8).
    pub stderr: String,

    /// Exit status, if the server reported one.
    pub exit_status: Option<u32>,
}

impl ExecOutput {
    /// Whether the command exited with status 0.
    pub fn is_success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// How an interactive process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, if one was reported.
    pub code: Option<u32>,

    /// Signal name, if the process was killed by a signal.
    pub signal: Option<String>,
}

impl ProcessExit {
    /// Whether the process exited cleanly.
    pub fn is_success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

/// Handle to a running interactive process.
#[derive(Debug)]
pub struct RemoteProcess {
    command: String,
    task: JoinHandle<Result<ProcessExit>>,
}

impl RemoteProcess {
    /// Wrap the task that drives the process I/O.
    pub fn new(command: impl Into<String>, task: JoinHandle<Result<ProcessExit>>) -> Self {
        Self {
            command: command.into(),
            task,
        }
    }

    /// The command line that was started.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the I/O task has already ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the process to exit.
    pub async fn wait(self) -> Result<ProcessExit> {
        self.task
            .await
            .map_err(|e| ChannelError::TaskFailed(e.to_string()))?
    }
}

/// Quote `word` for a POSIX shell command line.
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
