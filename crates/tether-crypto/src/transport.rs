//! Client-side transport configuration.

use std::fmt;
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, ServerName};

use crate::authority::{EphemeralCa, IssuedLeaf, LeafRole};
use crate::error::{CryptoError, CryptoResult};

/// Shared `ring` crypto provider used for every configuration this crate builds.
pub(crate) fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// A `rustls` client configuration that trusts exactly one launch authority
/// and presents the host's client certificate.
///
/// Ownership moves to the execution handle once the launch is started.
#[derive(Clone)]
pub struct ClientTransportConfig {
    tls: Arc<rustls::ClientConfig>,
    server_name: ServerName<'static>,
    ca_cert_der: CertificateDer<'static>,
    client_cert_der: CertificateDer<'static>,
}

impl ClientTransportConfig {
    /// Build from an authority and a client leaf it issued.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Tls`] if the leaf is not a client leaf, the
    /// server name is invalid, or `rustls` rejects the certificates.
    pub fn new(ca: &EphemeralCa, client: &IssuedLeaf, server_name: &str) -> CryptoResult<Self> {
        if client.role() != LeafRole::Client {
            return Err(CryptoError::Tls(
                "client transport requires a client leaf".into(),
            ));
        }

        let server_name = ServerName::try_from(server_name.to_owned())
            .map_err(|e| CryptoError::Tls(format!("invalid server name: {e}")))?;

        let mut roots = RootCertStore::empty();
        roots.add(ca.cert_der().clone())?;

        let tls = rustls::ClientConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_client_auth_cert(vec![client.cert_der().clone()], client.private_key_der())?;

        Ok(Self {
            tls: Arc::new(tls),
            server_name,
            ca_cert_der: ca.cert_der().clone(),
            client_cert_der: client.cert_der().clone(),
        })
    }

    /// The `rustls` configuration to hand to the transport.
    #[must_use]
    pub fn tls_config(&self) -> Arc<rustls::ClientConfig> {
        Arc::clone(&self.tls)
    }

    /// Name the client expects on the plugin's certificate.
    #[must_use]
    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    /// The only trusted root.
    #[must_use]
    pub fn ca_cert_der(&self) -> &CertificateDer<'static> {
        &self.ca_cert_der
    }

    /// The certificate presented to the plugin.
    #[must_use]
    pub fn client_cert_der(&self) -> &CertificateDer<'static> {
        &self.client_cert_der
    }
}

impl fmt::Debug for ClientTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTransportConfig")
            .field("server_name", &self.server_name)
            .field("ca_cert_len", &self.ca_cert_der.len())
            .field("client_cert_len", &self.client_cert_der.len())
            .finish_non_exhaustive()
    }
}
