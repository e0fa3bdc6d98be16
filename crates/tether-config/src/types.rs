//! Launcher configuration types.
//!
//! Self-contained: no dependency on other tether crates. `tether-launch`
//! converts these into its own settings at the boundary. Every struct
//! implements [`Default`] matching `defaults.toml`, so a bare `[section]`
//! header still produces a working configuration.

use serde::{Deserialize, Serialize};

/// Root launcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Transport bootstrap settings.
    pub bootstrap: BootstrapSection,
    /// Container backend settings.
    pub container: ContainerSection,
}

/// `[bootstrap]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSection {
    /// Validity of the per-launch authority and leaves, in seconds.
    pub ca_validity_secs: u64,
    /// Expiry of the wrapped server credentials, in seconds.
    pub wrap_ttl_secs: u64,
    /// Server name on the server leaf, used as SNI by the host.
    pub server_name: String,
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            ca_validity_secs: 3600,
            wrap_ttl_secs: 60,
            server_name: "localhost".to_owned(),
        }
    }
}

/// `[container]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSection {
    /// Default OCI runtime.
    pub runtime: String,
    /// Value of the `managed-by` provenance label.
    pub managed_by_label: String,
}

impl Default for ContainerSection {
    fn default() -> Self {
        Self {
            runtime: "runsc".to_owned(),
            managed_by_label: "tether".to_owned(),
        }
    }
}
