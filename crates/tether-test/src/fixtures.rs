//! Descriptor and option fixtures.

use tether_crypto::Sha256Digest;
use tether_launch::{HandshakeConfig, PluginDescriptor, PluginType};

/// A valid 32-byte digest (SHA-256 of `b"plugin-bin"`).
#[must_use]
pub fn sample_sha256() -> Vec<u8> {
    Sha256Digest::digest(b"plugin-bin").as_bytes().to_vec()
}

/// A storage plugin run as a local process.
#[must_use]
pub fn process_descriptor() -> PluginDescriptor {
    PluginDescriptor::process("plugin-bin", "plugin-bin", sample_sha256())
        .with_type(PluginType::Storage)
        .with_version("v1.0.0")
}

/// A plugin run in a container, tagged from its version.
#[must_use]
pub fn container_descriptor() -> PluginDescriptor {
    PluginDescriptor::container(
        "vault-plugin",
        "registry.example.com/vault-plugin",
        sample_sha256(),
    )
    .with_version("v1.2.0")
}

/// Handshake values matching the plugin SDK defaults used in tests.
#[must_use]
pub fn test_handshake() -> HandshakeConfig {
    HandshakeConfig {
        protocol_version: 5,
        magic_cookie_key: "TETHER_PLUGIN_MAGIC_COOKIE".to_owned(),
        magic_cookie_value: "9c1c4b8f6a5f4d2e".to_owned(),
    }
}
