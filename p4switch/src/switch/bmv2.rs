//! bmv2 `simple_switch` backend driving `simple_switch_CLI` over SSH.
//!
//! Commands are queued into the CLI's input stream and the call returns
//! right away; whatever the CLI prints ends up in the output buffer, which
//! can be inspected with [`SimpleSwitch::get_output`] or awaited with
//! [`SimpleSwitch::wait_for_output`].

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use regex::bytes::Regex;
use serde::Deserialize;

use super::Switch;
use super::entry::{EntryParams, TableEntry};
use crate::channel::{CommandStream, OutputBuffer};
use crate::error::Result;
use crate::session::{InteractiveSession, SessionState};
use crate::transport::{RemoteShell, SshConfig, SshTransport};

/// Settings for the remote `simple_switch_CLI` process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Bmv2Config {
    /// CLI executable on the switch host.
    pub cli_binary: String,

    /// Thrift port of the running `simple_switch`.
    pub thrift_port: u16,
}

impl Default for Bmv2Config {
    fn default() -> Self {
        Self {
            cli_binary: "simple_switch_CLI".to_string(),
            thrift_port: 9090,
        }
    }
}

impl Bmv2Config {
    /// Config for the given thrift port with the default CLI binary.
    pub fn with_thrift_port(thrift_port: u16) -> Self {
        Self {
            thrift_port,
            ..Self::default()
        }
    }

    /// Remote command line that starts the CLI.
    pub fn command_line(&self) -> String {
        format!("{} --thrift-port {}", self.cli_binary, self.thrift_port)
    }
}

/// `register_reset <name>`
pub fn register_reset_command(name: &str) -> String {
    format!("register_reset {}", name)
}

/// `register_write <name> [<index>] <value>`
pub fn register_write_command(name: &str, index: Option<u32>, value: u64) -> String {
    match index {
        Some(index) => format!("register_write {} {} {}", name, index, value),
        None => format!("register_write {} {}", name, value),
    }
}

fn join_values(params: &EntryParams) -> String {
    params
        .values()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `table_add <table> <action> <match values> => <action values>`
pub fn table_add_command(entry: &TableEntry) -> String {
    format!(
        "table_add {} {} {} => {}",
        entry.table(),
        entry.action(),
        join_values(entry.match_params()),
        join_values(entry.action_params())
    )
}

/// Handle to a bmv2 software switch.
///
/// Commands may be queued before [`connect`](Switch::connect); they are
/// delivered once the CLI starts.
pub struct SimpleSwitch<S: RemoteShell = SshTransport> {
    session: InteractiveSession<S>,
}

impl<S: RemoteShell> SimpleSwitch<S> {
    /// Create an unconnected handle.
    pub fn new(ssh_config: SshConfig, config: Bmv2Config) -> Self {
        Self {
            session: InteractiveSession::new(ssh_config, config.command_line()),
        }
    }

    /// Queue a raw CLI command. A trailing newline is added if missing.
    pub fn send_cmd(&self, command: &str) -> Result<()> {
        debug!("bmv2 <- {}", command.trim_end());
        self.session.input().write(command)
    }

    /// Everything the CLI has printed so far.
    pub fn get_output(&self) -> String {
        self.session.output().snapshot()
    }

    /// Shared handle to the CLI output.
    pub fn output(&self) -> &OutputBuffer {
        self.session.output()
    }

    /// The CLI input stream.
    pub fn input(&self) -> &Arc<CommandStream> {
        self.session.input()
    }

    /// Wait until the tail of the output matches `pattern`.
    pub async fn wait_for_output(&self, pattern: &Regex, timeout: Duration) -> Result<()> {
        self.session.output().wait_for(pattern, timeout).await
    }

    /// Lifecycle state of the SSH session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// How long `close` waits for the CLI to exit.
    pub fn set_close_timeout(&mut self, timeout: Duration) {
        self.session.set_close_timeout(timeout);
    }
}

impl<S: RemoteShell> Switch for SimpleSwitch<S> {
    async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// bmv2 resets whole register arrays; `index` is not part of the command.
    async fn reset_register(&mut self, name: &str, _index: Option<u32>) -> Result<()> {
        self.send_cmd(&register_reset_command(name))
    }

    async fn set_register(&mut self, name: &str, index: Option<u32>, value: u64) -> Result<()> {
        self.send_cmd(&register_write_command(name, index, value))
    }

    async fn update_table_entry(&mut self, entry: &TableEntry) -> Result<()> {
        self.send_cmd(&table_add_command(entry))
    }
}
