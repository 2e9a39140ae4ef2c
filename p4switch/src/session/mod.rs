//! Session lifecycle: owning one remote connection from connect to close.
//!
//! A [`Session`] is single-use. It starts `Unconnected`, becomes `Connected`
//! on the first [`connect`](Session::connect), and ends `Closed`. Connecting
//! again after close is an error rather than a silent reconnect.

mod interactive;

pub use interactive::InteractiveSession;

use log::debug;

use crate::error::{Result, SessionError};
use crate::transport::{RemoteShell, SshConfig, SshTransport};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection has been made yet.
    Unconnected,
    /// A live connection is held.
    Connected,
    /// The connection was released; the session cannot be reused.
    Closed,
}

enum State<S> {
    Unconnected,
    Connected(S),
    Closed,
}

/// Owner of exactly one remote connection.
pub struct Session<S: RemoteShell = SshTransport> {
    config: SshConfig,
    state: State<S>,
}

impl<S: RemoteShell> Session<S> {
    /// Create an unconnected session.
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            state: State::Unconnected,
        }
    }

    /// Connection parameters.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        match self.state {
            State::Unconnected => SessionState::Unconnected,
            State::Connected(_) => SessionState::Connected,
            State::Closed => SessionState::Closed,
        }
    }

    /// Whether a live connection is held.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected(_))
    }

    /// Connect if not already connected.
    ///
    /// Connection errors are returned as-is; nothing is retried.
    pub async fn connect(&mut self) -> Result<()> {
        match self.state {
            State::Connected(_) => Ok(()),
            State::Closed => Err(SessionError::Closed.into()),
            State::Unconnected => {
                let shell = S::connect(&self.config).await?;
                self.state = State::Connected(shell);
                Ok(())
            }
        }
    }

    /// The live connection.
    pub fn shell(&self) -> Result<&S> {
        match &self.state {
            State::Connected(shell) => Ok(shell),
            State::Unconnected => Err(SessionError::NotConnected.into()),
            State::Closed => Err(SessionError::Closed.into()),
        }
    }

    /// Release the connection. The session is `Closed` afterwards even if
    /// the disconnect itself fails.
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Connected(shell) => {
                debug!("disconnecting from {}", self.config.socket_addr());
                shell.disconnect().await
            }
            State::Unconnected | State::Closed => Ok(()),
        }
    }
}
