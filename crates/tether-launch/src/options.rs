//! Per-launch options supplied by the caller.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::Span;

/// Versioned plugin protocol sets, keyed by protocol version.
///
/// Passed through to the transport library unchanged.
pub type ProtocolSets = BTreeMap<u32, Vec<String>>;

/// Wire protocols the host accepts from a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Go-style `net/rpc` over a multiplexed stream.
    NetRpc,
    /// gRPC over HTTP/2.
    Grpc,
}

impl Protocol {
    /// Every protocol the host accepts, in preference order.
    pub const ALLOWED: [Self; 2] = [Self::NetRpc, Self::Grpc];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetRpc => f.write_str("netrpc"),
            Self::Grpc => f.write_str("grpc"),
        }
    }
}

/// Handshake settings shared by host and plugin.
///
/// The magic cookie is a UX guard against running a plugin binary by hand,
/// not a security boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Base protocol version.
    pub protocol_version: u32,
    /// Name of the cookie environment variable.
    pub magic_cookie_key: String,
    /// Expected cookie value.
    pub magic_cookie_value: String,
}

/// Caller-supplied options for one launch.
///
/// A plain value with explicit defaults; construct it with struct update
/// syntax:
///
/// ```
/// use tether_launch::LaunchOptions;
///
/// let options = LaunchOptions {
///     metadata_mode: true,
///     ..LaunchOptions::default()
/// };
/// assert!(!options.auto_mtls);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Launch only to read plugin metadata. Skips transport bootstrap.
    pub metadata_mode: bool,
    /// Let the transport library negotiate trust itself. Skips transport
    /// bootstrap.
    pub auto_mtls: bool,
    /// Ask the plugin to lock its memory. OR-ed with the host policy.
    pub mlock: bool,
    /// Handshake settings, passed through.
    pub handshake: HandshakeConfig,
    /// Versioned protocol sets, passed through.
    pub protocol_sets: ProtocolSets,
    /// Parent span for the plugin's log records.
    pub log_span: Option<Span>,
    /// Extra `KEY=VALUE` entries, applied last.
    pub extra_env: Vec<String>,
}

impl LaunchOptions {
    /// Whether this launch needs an explicit transport bootstrap.
    #[must_use]
    pub fn needs_bootstrap(&self) -> bool {
        !self.metadata_mode && !self.auto_mtls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_require_bootstrap() {
        let options = LaunchOptions::default();
        assert!(options.needs_bootstrap());
        assert!(options.extra_env.is_empty());
        assert!(options.log_span.is_none());
    }

    #[test]
    fn test_either_flag_skips_bootstrap() {
        let metadata = LaunchOptions {
            metadata_mode: true,
            ..LaunchOptions::default()
        };
        let auto = LaunchOptions {
            auto_mtls: true,
            ..LaunchOptions::default()
        };
        assert!(!metadata.needs_bootstrap());
        assert!(!auto.needs_bootstrap());
    }

    #[test]
    fn test_protocol_serde_names() {
        let json = serde_json::to_string(&Protocol::ALLOWED).unwrap();
        assert_eq!(json, r#"["net_rpc","grpc"]"#);
        assert_eq!(Protocol::NetRpc.to_string(), "netrpc");
    }
}
