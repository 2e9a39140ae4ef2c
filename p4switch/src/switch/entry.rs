//! Table update intent shared by all backends.

use indexmap::IndexMap;

use super::value::MatchValue;

/// Ordered `name -> value` parameters of a table entry.
pub type EntryParams = IndexMap<String, MatchValue>;

/// A table insertion: which table, what to match, which action to run with
/// which parameters.
///
/// Parameters keep insertion order, which is the order backends emit them in.
///
/// # Example
///
/// ```rust
/// use p4switch::{IpPrefix, TableEntry};
///
/// let entry = TableEntry::new("ipv4_lpm", "ipv4_forward")
///     .with_match("hdr.ipv4.dstAddr", "10.0.1.0/24".parse::<IpPrefix>().unwrap())
///     .with_param("port", 3u16);
/// assert_eq!(entry.match_params().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    table: String,
    match_params: EntryParams,
    action: String,
    action_params: EntryParams,
}

impl TableEntry {
    /// Entry for `table` running `action`, with no parameters yet.
    pub fn new(table: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            match_params: EntryParams::new(),
            action: action.into(),
            action_params: EntryParams::new(),
        }
    }

    /// Entry from already-built parameter maps.
    pub fn from_parts(
        table: impl Into<String>,
        match_params: EntryParams,
        action: impl Into<String>,
        action_params: EntryParams,
    ) -> Self {
        Self {
            table: table.into(),
            match_params,
            action: action.into(),
            action_params,
        }
    }

    /// Add a match field.
    pub fn with_match(mut self, name: impl Into<String>, value: impl Into<MatchValue>) -> Self {
        self.match_params.insert(name.into(), value.into());
        self
    }

    /// Add an action parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<MatchValue>) -> Self {
        self.action_params.insert(name.into(), value.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn match_params(&self) -> &EntryParams {
        &self.match_params
    }

    pub fn action_params(&self) -> &EntryParams {
        &self.action_params
    }
}
