//! The resolved launch configuration.

use std::fmt;

use tether_crypto::ClientTransportConfig;
use tracing::Span;

use crate::backend::LaunchBackend;
use crate::descriptor::PluginType;
use crate::env::{UNWRAP_TOKEN_ENV, split_entry};
use crate::options::{HandshakeConfig, Protocol, ProtocolSets};

/// Everything an execution factory needs to start one plugin.
///
/// Produced only by [`LaunchConfigBuilder::build`](crate::LaunchConfigBuilder::build)
/// and immutable afterwards. The factory takes it by value; the transport
/// configuration moves with it into the resulting handle.
pub struct ResolvedLaunchConfig {
    pub(crate) name: String,
    pub(crate) plugin_type: PluginType,
    pub(crate) version: String,
    pub(crate) env: Vec<String>,
    pub(crate) backend: LaunchBackend,
    pub(crate) transport: Option<ClientTransportConfig>,
    pub(crate) metadata_mode: bool,
    pub(crate) auto_mtls: bool,
    pub(crate) handshake: HandshakeConfig,
    pub(crate) protocol_sets: ProtocolSets,
    pub(crate) span: Span,
}

impl ResolvedLaunchConfig {
    /// Plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin category.
    #[must_use]
    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    /// Descriptor version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Final `KEY=VALUE` environment, in precedence order.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Value of `key` in the final environment.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env_pairs().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// The final environment as key/value pairs.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().filter_map(|e| split_entry(e))
    }

    /// Selected backend.
    #[must_use]
    pub fn backend(&self) -> &LaunchBackend {
        &self.backend
    }

    /// Client transport for an explicit bootstrap. `None` means the
    /// transport library negotiates trust itself, or no channel is needed.
    #[must_use]
    pub fn transport(&self) -> Option<&ClientTransportConfig> {
        self.transport.as_ref()
    }

    /// Whether the plugin runs in metadata mode.
    #[must_use]
    pub fn metadata_mode(&self) -> bool {
        self.metadata_mode
    }

    /// Whether the transport library negotiates trust itself.
    #[must_use]
    pub fn auto_mtls(&self) -> bool {
        self.auto_mtls
    }

    /// Handshake settings.
    #[must_use]
    pub fn handshake(&self) -> &HandshakeConfig {
        &self.handshake
    }

    /// Versioned protocol sets.
    #[must_use]
    pub fn protocol_sets(&self) -> &ProtocolSets {
        &self.protocol_sets
    }

    /// Wire protocols the host accepts.
    #[must_use]
    pub fn allowed_protocols(&self) -> &'static [Protocol] {
        &Protocol::ALLOWED
    }

    /// Whether the host environment must not be inherited. Always true for
    /// containers.
    #[must_use]
    pub fn skip_host_env(&self) -> bool {
        matches!(self.backend, LaunchBackend::Container(_))
    }

    /// Span carrying the plugin's identity for its log records.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl fmt::Debug for ResolvedLaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env: Vec<&str> = self
            .env
            .iter()
            .map(|e| match split_entry(e) {
                Some((UNWRAP_TOKEN_ENV, _)) => "TETHER_UNWRAP_TOKEN=[REDACTED]",
                _ => e.as_str(),
            })
            .collect();
        f.debug_struct("ResolvedLaunchConfig")
            .field("name", &self.name)
            .field("plugin_type", &self.plugin_type)
            .field("version", &self.version)
            .field("env", &env)
            .field("backend", &self.backend)
            .field("transport", &self.transport)
            .field("metadata_mode", &self.metadata_mode)
            .field("auto_mtls", &self.auto_mtls)
            .field("handshake", &self.handshake)
            .field("protocol_sets", &self.protocol_sets)
            .finish_non_exhaustive()
    }
}
