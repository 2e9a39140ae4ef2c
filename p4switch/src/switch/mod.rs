//! Switch control: one capability contract, two backends.
//!
//! - [`SimpleSwitch`] drives bmv2's `simple_switch_CLI` interactively.
//! - [`TofinoSwitch`] runs one bfrt script per table update.

pub mod bmv2;
mod builder;
mod entry;
pub mod tofino;
mod value;

pub use bmv2::{Bmv2Config, SimpleSwitch};
pub use builder::SwitchBuilder;
pub use entry::{EntryParams, TableEntry};
pub use tofino::{TofinoConfig, TofinoSwitch};
pub use value::{IpPrefix, MacAddress, MatchValue};

use std::future::Future;

use crate::error::Result;

/// Operations every switch backend offers.
///
/// Backends that lack a capability return
/// [`SwitchError::Unsupported`](crate::error::SwitchError::Unsupported)
/// instead of silently doing nothing.
pub trait Switch: Send {
    /// Connect to the switch. Does nothing if already connected.
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Tear the connection down. The handle cannot be reconnected.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Check if the connection is up.
    fn is_connected(&self) -> bool;

    /// Reset a register (array) to zero.
    fn reset_register(
        &mut self,
        name: &str,
        index: Option<u32>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Write `value` to a register, optionally at `index`.
    fn set_register(
        &mut self,
        name: &str,
        index: Option<u32>,
        value: u64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Insert (or replace) a table entry.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use p4switch::{Switch, TableEntry};
    ///
    /// # async fn example(switch: &mut impl Switch) -> Result<(), p4switch::Error> {
    /// let entry = TableEntry::new("dmac", "forward")
    ///     .with_match("dst", "00:00:00:00:01:01".parse::<p4switch::MacAddress>()?)
    ///     .with_param("port", 1u16);
    /// switch.update_table_entry(&entry).await?;
    /// # Ok(())
    /// # }
    /// ```
    fn update_table_entry(&mut self, entry: &TableEntry)
    -> impl Future<Output = Result<()>> + Send;
}
