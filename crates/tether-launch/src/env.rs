//! Plugin environment assembly.
//!
//! The variable names below are a compatibility surface shared with the
//! plugin-side SDK. Changing one breaks every deployed plugin.

use crate::error::{LaunchError, LaunchResult};

/// Resolved host version.
pub const HOST_VERSION_ENV: &str = "TETHER_HOST_VERSION";
/// `"true"` when the plugin runs in metadata mode.
pub const METADATA_MODE_ENV: &str = "TETHER_PLUGIN_METADATA_MODE";
/// `"true"` when the transport library negotiates trust itself.
pub const AUTO_MTLS_ENV: &str = "TETHER_PLUGIN_AUTOMTLS_ENABLED";
/// Present (as `"true"`) only when memory locking is requested.
pub const MLOCK_ENABLED_ENV: &str = "TETHER_PLUGIN_MLOCK_ENABLED";
/// Present only after an explicit transport bootstrap.
pub const UNWRAP_TOKEN_ENV: &str = "TETHER_UNWRAP_TOKEN";

/// Ordered `KEY=VALUE` list where a later write to a key replaces the
/// earlier one and moves it to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EnvList {
    entries: Vec<(String, String)>,
}

impl EnvList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a raw `KEY=VALUE` entry.
    pub(crate) fn push_entry(&mut self, op: &'static str, entry: &str) -> LaunchResult<()> {
        let (key, value) = split_entry(entry).ok_or_else(|| {
            LaunchError::invalid(
                op,
                format!("environment entry {entry:?} is not of the form KEY=VALUE"),
            )
        })?;
        self.set(key, value);
        Ok(())
    }

    /// Append every entry in order.
    pub(crate) fn extend_entries<'a>(
        &mut self,
        op: &'static str,
        entries: impl IntoIterator<Item = &'a String>,
    ) -> LaunchResult<()> {
        for entry in entries {
            self.push_entry(op, entry)?;
        }
        Ok(())
    }

    pub(crate) fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.retain(|(k, _)| k != key);
        self.entries.push((key.to_owned(), value.into()));
    }

    pub(crate) fn set_flag(&mut self, key: &str, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    pub(crate) fn into_entries(self) -> Vec<String> {
        self.entries
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect()
    }
}

/// Split `KEY=VALUE` at the first `=`. The key must be non-empty.
pub(crate) fn split_entry(entry: &str) -> Option<(&str, &str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Some((key, value)),
        _ => None,
    }
}
