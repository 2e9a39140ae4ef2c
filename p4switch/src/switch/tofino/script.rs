//! bfrt python script generation.
//!
//! A table update becomes a small script that deletes any existing entry
//! with the same key (ignoring failure) and then adds the new one, so the
//! update is an upsert.

use chrono::{DateTime, Local, SecondsFormat};
use uuid::Uuid;

use crate::error::SwitchError;
use crate::switch::entry::{EntryParams, TableEntry};
use crate::switch::value::{MatchValue, ip_value};

fn nonzero_address(name: &str, value: u128) -> Result<u128, SwitchError> {
    if value == 0 {
        return Err(SwitchError::InvalidValue {
            field: name.to_string(),
            message: "empty address".to_string(),
        });
    }
    Ok(value)
}

/// bfrt keyword arguments for one parameter.
///
/// Addresses become `name=0x..`; networks add `name_p_length=<len>`;
/// integers are decimal and identifiers are copied verbatim.
pub fn format_field(name: &str, value: &MatchValue) -> Result<Vec<String>, SwitchError> {
    let fields = match value {
        MatchValue::Mac(mac) => {
            let v = nonzero_address(name, u128::from(mac.value()))?;
            vec![format!("{}={:#x}", name, v)]
        }
        MatchValue::Ip(ip) => {
            let v = nonzero_address(name, ip_value(*ip))?;
            vec![format!("{}={:#x}", name, v)]
        }
        MatchValue::Network(net) => {
            let v = nonzero_address(name, ip_value(net.addr()))?;
            vec![
                format!("{}={:#x}", name, v),
                format!("{}_p_length={}", name, net.prefix_len()),
            ]
        }
        MatchValue::Int(n) => vec![format!("{}={}", name, n)],
        MatchValue::Ident(s) => vec![format!("{}={}", name, s)],
    };
    Ok(fields)
}

/// Format every parameter, in order.
pub fn format_params(params: &EntryParams) -> Result<Vec<String>, SwitchError> {
    let mut out = Vec::with_capacity(params.len());
    for (name, value) in params {
        out.extend(format_field(name, value)?);
    }
    Ok(out)
}

/// Render the delete-then-add script for `entry`.
///
/// Fails on invalid values before anything is produced.
pub fn render_table_update(
    entry: &TableEntry,
    pipeline: &str,
    timestamp: DateTime<Local>,
) -> Result<String, SwitchError> {
    let match_fields = format_params(entry.match_params())?;
    let action_fields = format_params(entry.action_params())?;

    let add_fields: Vec<&str> = match_fields
        .iter()
        .chain(action_fields.iter())
        .map(String::as_str)
        .collect();

    Ok(format!(
        "# {timestamp}
table=bfrt.{pipeline}.{table}
try:
    table.delete(
        {delete_args}
    )
except:
    pass
table.add_with_{action}(
    {add_args}
)
",
        timestamp = timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
        pipeline = pipeline,
        table = entry.table(),
        delete_args = match_fields.join(",\n        "),
        action = entry.action(),
        add_args = add_fields.join(",\n    "),
    ))
}

/// A script to upload under a fresh, unique name.
#[derive(Debug, Clone)]
pub struct ScriptArtifact {
    path: String,
    body: String,
}

impl ScriptArtifact {
    /// Place `body` in `dir` under a random `<uuid>.py` name.
    pub fn new(dir: &str, body: impl Into<String>) -> Self {
        let dir = dir.trim_end_matches('/');
        Self {
            path: format!("{}/{}.py", dir, Uuid::new_v4()),
            body: body.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
