//! Session wrapping a long-lived interactive CLI process.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::{Session, SessionState};
use crate::channel::{CommandStream, OutputBuffer};
use crate::error::Result;
use crate::transport::{RemoteProcess, RemoteShell, SshConfig, SshTransport};

/// A [`Session`] plus one remote process fed by a [`CommandStream`].
///
/// The process is started by [`connect`](Self::connect) and stopped by
/// [`close`](Self::close), which sends Ctrl-C and waits for it to exit.
pub struct InteractiveSession<S: RemoteShell = SshTransport> {
    session: Session<S>,
    command: String,
    input: Arc<CommandStream>,
    output: OutputBuffer,
    process: Option<RemoteProcess>,
    close_timeout: Duration,
}

impl<S: RemoteShell> InteractiveSession<S> {
    /// Create an unconnected session that will run `command`.
    pub fn new(config: SshConfig, command: impl Into<String>) -> Self {
        let close_timeout = config.timeout;
        Self {
            session: Session::new(config),
            command: command.into(),
            input: Arc::new(CommandStream::new()),
            output: OutputBuffer::default(),
            process: None,
            close_timeout,
        }
    }

    /// How long [`close`](Self::close) waits for the process to exit.
    pub fn set_close_timeout(&mut self, timeout: Duration) {
        self.close_timeout = timeout;
    }

    /// The remote command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Input stream of the remote process.
    pub fn input(&self) -> &Arc<CommandStream> {
        &self.input
    }

    /// Output captured from the remote process.
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Lifecycle state of the underlying connection.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether the connection is up.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Connect and start the process, unless already running.
    ///
    /// Does not wait for the process to do anything.
    pub async fn connect(&mut self) -> Result<()> {
        self.session.connect().await?;

        if self.process.is_none() {
            let process = self
                .session
                .shell()?
                .spawn_interactive(&self.command, self.input.clone(), self.output.clone())
                .await?;
            self.process = Some(process);
        }
        Ok(())
    }

    /// Stop the process and release the connection.
    ///
    /// A non-zero exit after Ctrl-C is normal and only logged. The
    /// connection is released whatever happened to the process.
    pub async fn close(&mut self) -> Result<()> {
        self.input.send_terminate();

        if let Some(process) = self.process.take() {
            let command = process.command().to_string();
            match tokio::time::timeout(self.close_timeout, process.wait()).await {
                Ok(Ok(exit)) if exit.is_success() => debug!("'{}' exited cleanly", command),
                Ok(Ok(exit)) => info!("'{}' has been closed ({:?})", command, exit),
                Ok(Err(e)) => info!("'{}' has been closed: {}", command, e),
                Err(_) => warn!(
                    "'{}' did not exit within {:?}, dropping the connection",
                    command, self.close_timeout
                ),
            }
        }

        let result = self.session.close().await;
        info!("remaining switch CLI output:\n{}", self.output.snapshot());
        result
    }
}
