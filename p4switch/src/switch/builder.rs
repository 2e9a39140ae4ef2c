//! Builder for creating switch handles.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::Switch;
use super::bmv2::{Bmv2Config, SimpleSwitch};
use super::tofino::{TofinoConfig, TofinoSwitch};
use crate::error::{Result, SwitchError};
use crate::transport::{AuthMethod, HostKeyVerification, RemoteShell, SshConfig};

/// Builder for constructing switch handles.
///
/// # Example
///
/// ```rust,no_run
/// use p4switch::{Bmv2Config, Switch, SwitchBuilder};
///
/// # async fn example() -> Result<(), p4switch::Error> {
/// let mut switch = SwitchBuilder::new("192.168.1.10")
///     .username("p4")
///     .password("p4")
///     .build_bmv2(Bmv2Config::with_thrift_port(9090))?;
/// switch.connect().await?;
/// switch.set_register("r0", None, 5).await?;
/// switch.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SwitchBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    timeout: Duration,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
}

impl SwitchBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set terminal dimensions for the CLI PTY.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Accept any host key. Only for lab switches.
    pub fn danger_disable_host_key_verification(self) -> Self {
        self.host_key_verification(HostKeyVerification::Disabled)
    }

    /// Use a specific known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    fn ssh_config(self) -> Result<SshConfig> {
        let username = self.username.ok_or_else(|| SwitchError::InvalidConfig {
            message: "Username is required".to_string(),
        })?;
        if self.host.is_empty() {
            return Err(SwitchError::InvalidConfig {
                message: "Host is required".to_string(),
            }
            .into());
        }

        Ok(SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        })
    }

    /// Build an unconnected bmv2 handle.
    pub fn build_bmv2(self, config: Bmv2Config) -> Result<SimpleSwitch> {
        self.build_bmv2_on(config)
    }

    /// Build an unconnected Tofino handle.
    pub fn build_tofino(self, config: TofinoConfig) -> Result<TofinoSwitch> {
        self.build_tofino_on(config)
    }

    /// Build a bmv2 handle and connect it right away.
    pub async fn connect_bmv2(self, config: Bmv2Config) -> Result<SimpleSwitch> {
        self.connect_bmv2_on(config).await
    }

    /// Build a Tofino handle and connect it right away.
    pub async fn connect_tofino(self, config: TofinoConfig) -> Result<TofinoSwitch> {
        self.connect_tofino_on(config).await
    }

    /// [`build_bmv2`](Self::build_bmv2) over a custom transport.
    pub fn build_bmv2_on<S: RemoteShell>(self, config: Bmv2Config) -> Result<SimpleSwitch<S>> {
        Ok(SimpleSwitch::new(self.ssh_config()?, config))
    }

    /// [`build_tofino`](Self::build_tofino) over a custom transport.
    pub fn build_tofino_on<S: RemoteShell>(self, config: TofinoConfig) -> Result<TofinoSwitch<S>> {
        Ok(TofinoSwitch::new(self.ssh_config()?, config))
    }

    /// [`connect_bmv2`](Self::connect_bmv2) over a custom transport.
    pub async fn connect_bmv2_on<S: RemoteShell>(
        self,
        config: Bmv2Config,
    ) -> Result<SimpleSwitch<S>> {
        let mut switch = self.build_bmv2_on(config)?;
        switch.connect().await?;
        Ok(switch)
    }

    /// [`connect_tofino`](Self::connect_tofino) over a custom transport.
    pub async fn connect_tofino_on<S: RemoteShell>(
        self,
        config: TofinoConfig,
    ) -> Result<TofinoSwitch<S>> {
        let mut switch = self.build_tofino_on(config)?;
        switch.connect().await?;
        Ok(switch)
    }
}
