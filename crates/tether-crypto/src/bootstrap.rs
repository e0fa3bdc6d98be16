//! One-shot transport bootstrap: authority, both leaves, client config and
//! sealed server payload in a single call.

use std::time::Duration;

use tracing::debug;

use crate::authority::{EphemeralCa, LeafRole};
use crate::error::CryptoResult;
use crate::payload::SealedServerPayload;
use crate::transport::ClientTransportConfig;

/// Parameters for [`TransportBootstrap::generate`].
#[derive(Debug, Clone)]
pub struct BootstrapParams {
    /// DNS name (or IP) placed on the server leaf and used as SNI.
    pub server_name: String,
    /// Validity window of the authority and both leaves.
    pub validity: Duration,
}

impl BootstrapParams {
    /// Create bootstrap parameters.
    #[must_use]
    pub fn new(server_name: impl Into<String>, validity: Duration) -> Self {
        Self {
            server_name: server_name.into(),
            validity,
        }
    }
}

/// The artifacts of one bootstrap: the host's client transport and the
/// plugin's sealed server credentials.
///
/// The authority's signing key does not survive this value's construction.
#[derive(Debug)]
pub struct TransportBootstrap {
    client: ClientTransportConfig,
    sealed: SealedServerPayload,
}

impl TransportBootstrap {
    /// Generate a fresh authority, sign a client and a server leaf, and
    /// package them.
    ///
    /// # Errors
    ///
    /// Any failure in key generation, signing or TLS configuration is
    /// returned as-is; no partial artifacts escape.
    pub fn generate(params: &BootstrapParams) -> CryptoResult<Self> {
        let ca = EphemeralCa::generate(params.validity)?;

        let client_leaf = ca.issue(LeafRole::Client, &params.server_name)?;
        let client = ClientTransportConfig::new(&ca, &client_leaf, &params.server_name)?;

        let server_leaf = ca.issue(LeafRole::Server, &params.server_name)?;
        let sealed = SealedServerPayload::seal(&ca, &server_leaf)?;

        debug!(
            server_name = %params.server_name,
            validity_secs = params.validity.as_secs(),
            payload_len = sealed.len(),
            "generated ephemeral launch authority"
        );

        Ok(Self { client, sealed })
    }

    /// The host-side transport configuration.
    #[must_use]
    pub fn client(&self) -> &ClientTransportConfig {
        &self.client
    }

    /// Split into the client transport and the sealed server payload.
    #[must_use]
    pub fn into_parts(self) -> (ClientTransportConfig, SealedServerPayload) {
        (self.client, self.sealed)
    }
}
