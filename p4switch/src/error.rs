//! Error types for p4switch.

use std::io;
use thiserror::Error;

/// Main error type for p4switch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel and command stream errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Switch backend errors
    #[error("Switch error: {0}")]
    Switch(#[from] SwitchError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl TransportError {
    /// Classify an error raised while establishing the connection.
    pub fn from_connect(error: russh::Error, host: &str, port: u16) -> Self {
        match error {
            russh::Error::IO(source) => TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                source,
            },
            russh::Error::Disconnect | russh::Error::HUP => TransportError::Disconnected,
            other => TransportError::Ssh(other),
        }
    }
}

/// Channel layer errors (remote processes, command stream, uploads).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// The command stream already carries a terminate signal
    #[error("Command stream is closed for input")]
    InputClosed,

    /// Writing a file on the remote host failed
    #[error("Upload to '{path}' failed: {message}")]
    UploadFailed { path: String, message: String },

    /// Pattern did not show up in the output in time
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(std::time::Duration),

    /// The background I/O task panicked or was cancelled
    #[error("Remote process task failed: {0}")]
    TaskFailed(String),
}

/// Session lifecycle errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session not connected
    #[error("Session not connected - call connect() first")]
    NotConnected,

    /// Session was closed and cannot be reused
    #[error("Session already closed")]
    Closed,
}

/// Switch backend errors.
#[derive(Error, Debug)]
pub enum SwitchError {
    /// The backend does not implement this operation
    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// A match or action value cannot be encoded
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The remote script wrote to its error stream
    #[error("Remote command '{command}' reported errors:\n{stdout}")]
    RemoteExecution {
        command: String,
        stdout: String,
        stderr: String,
    },

    /// Invalid configuration in the switch builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias using p4switch's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_io_error_names_the_host() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::from_connect(russh::Error::IO(refused), "10.0.0.5", 22);

        assert!(matches!(err, TransportError::ConnectionFailed { port: 22, .. }));
        assert!(err.to_string().starts_with("Connection failed to 10.0.0.5:22"));
    }

    #[test]
    fn test_connect_hangup_is_disconnect() {
        assert!(matches!(
            TransportError::from_connect(russh::Error::HUP, "sw", 22),
            TransportError::Disconnected
        ));
        assert!(matches!(
            TransportError::from_connect(russh::Error::Disconnect, "sw", 22),
            TransportError::Disconnected
        ));
    }

    #[test]
    fn test_connect_protocol_error_stays_ssh() {
        assert!(matches!(
            TransportError::from_connect(russh::Error::Inconsistent, "sw", 22),
            TransportError::Ssh(_)
        ));
    }
}
