//! # p4switch
//!
//! Async control of P4 switches over SSH.
//!
//! Two backends implement the same [`Switch`] contract:
//!
//! - [`SimpleSwitch`] (bmv2): keeps `simple_switch_CLI` running on the remote
//!   host under a PTY and feeds it commands through a [`CommandStream`].
//!   Calls return once the command is queued; output collects in an
//!   [`OutputBuffer`].
//! - [`TofinoSwitch`]: renders each table update into a bfrt python script,
//!   uploads it, runs it with `run_bfshell.sh -b` and fails the call if the
//!   script wrote to stderr.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use p4switch::{Bmv2Config, Switch, SwitchBuilder, TableEntry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), p4switch::Error> {
//!     let mut switch = SwitchBuilder::new("192.168.1.10")
//!         .username("p4")
//!         .password("p4")
//!         .connect_bmv2(Bmv2Config::with_thrift_port(9090))
//!         .await?;
//!
//!     let entry = TableEntry::new("t1", "fwd")
//!         .with_match("a", 1u32)
//!         .with_param("port", 3u32);
//!     switch.update_table_entry(&entry).await?;
//!
//!     switch.close().await?;
//!     println!("{}", switch.get_output());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod session;
pub mod switch;
pub mod transport;

// Re-export main types for convenience
pub use channel::{CommandStream, OutputBuffer};
pub use error::Error;
pub use session::{InteractiveSession, Session, SessionState};
pub use switch::{
    Bmv2Config, IpPrefix, MacAddress, MatchValue, SimpleSwitch, Switch, SwitchBuilder, TableEntry,
    TofinoConfig, TofinoSwitch,
};
pub use transport::{AuthMethod, HostKeyVerification, RemoteShell, SshConfig, SshTransport};
