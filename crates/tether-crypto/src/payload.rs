//! Server TLS material handed to the plugin through the wrapping service.
//!
//! The host serializes the plugin's server certificate, its private key and
//! the launch authority into a [`SealedServerPayload`]. The only way to get
//! bytes out of it is [`SealedServerPayload::into_wrap_bytes`], which
//! consumes the payload so it can be passed to the wrapping service exactly
//! once. On the plugin side, the unwrapped bytes are decoded with
//! [`ServerTlsPayload::from_unwrapped`].
//!
//! Wire format (JSON, DER values base64-encoded):
//!
//! ```json
//! { "server_cert": "...", "server_key": "...", "ca_cert": "..." }
//! ```

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::authority::{EphemeralCa, IssuedLeaf, LeafRole};
use crate::error::{CryptoError, CryptoResult};
use crate::transport::provider;

#[derive(Serialize)]
struct WireOut<'a> {
    server_cert: &'a str,
    server_key: &'a str,
    ca_cert: &'a str,
}

#[derive(Deserialize)]
struct WireIn {
    server_cert: String,
    server_key: String,
    ca_cert: String,
}

impl Drop for WireIn {
    fn drop(&mut self) {
        self.server_key.zeroize();
    }
}

/// Serialized server credentials, ready to be wrapped.
///
/// Not `Clone`, not `Serialize`, and its `Debug` output never includes the
/// contents.
pub struct SealedServerPayload {
    bytes: Zeroizing<Vec<u8>>,
}

impl SealedServerPayload {
    /// Seal a server leaf together with the authority that issued it.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Payload`] if `server` is not a server leaf or
    /// encoding fails.
    pub fn seal(ca: &EphemeralCa, server: &IssuedLeaf) -> CryptoResult<Self> {
        if server.role() != LeafRole::Server {
            return Err(CryptoError::Payload(
                "sealed payload requires a server leaf".into(),
            ));
        }

        let server_cert = STANDARD.encode(server.cert_der());
        let server_key = Zeroizing::new(STANDARD.encode(server.key_der()));
        let ca_cert = STANDARD.encode(ca.cert_der());

        let wire = WireOut {
            server_cert: &server_cert,
            server_key: &server_key,
            ca_cert: &ca_cert,
        };

        let mut bytes = Zeroizing::new(Vec::with_capacity(
            server_cert
                .len()
                .saturating_add(server_key.len())
                .saturating_add(ca_cert.len())
                .saturating_add(64),
        ));
        serde_json::to_writer(&mut *bytes, &wire)
            .map_err(|e| CryptoError::Payload(e.to_string()))?;

        Ok(Self { bytes })
    }

    /// Size of the sealed payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty (never true for a sealed leaf).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Release the cleartext for the single wrap call.
    ///
    /// The returned buffer is zeroized when dropped.
    #[must_use]
    pub fn into_wrap_bytes(self) -> Zeroizing<Vec<u8>> {
        self.bytes
    }
}

impl fmt::Debug for SealedServerPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedServerPayload")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Decoded server credentials, as seen by the plugin after unwrapping.
pub struct ServerTlsPayload {
    server_cert: CertificateDer<'static>,
    server_key: Zeroizing<Vec<u8>>,
    ca_cert: CertificateDer<'static>,
}

impl ServerTlsPayload {
    /// Decode the bytes returned by the wrapping service.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Payload`] if the JSON or base64 is malformed.
    pub fn from_unwrapped(bytes: &[u8]) -> CryptoResult<Self> {
        let wire: WireIn =
            serde_json::from_slice(bytes).map_err(|e| CryptoError::Payload(e.to_string()))?;

        let decode = |field: &str, value: &str| {
            STANDARD
                .decode(value)
                .map_err(|e| CryptoError::Payload(format!("{field}: {e}")))
        };

        Ok(Self {
            server_cert: CertificateDer::from(decode("server_cert", &wire.server_cert)?),
            server_key: Zeroizing::new(decode("server_key", &wire.server_key)?),
            ca_cert: CertificateDer::from(decode("ca_cert", &wire.ca_cert)?),
        })
    }

    /// The plugin's server certificate.
    #[must_use]
    pub fn server_cert_der(&self) -> &CertificateDer<'static> {
        &self.server_cert
    }

    /// The launch authority certificate.
    #[must_use]
    pub fn ca_cert_der(&self) -> &CertificateDer<'static> {
        &self.ca_cert
    }

    /// Build a `rustls` server configuration that presents the server
    /// certificate and requires a client certificate from the same authority.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Tls`] if `rustls` rejects the material.
    pub fn server_config(&self) -> CryptoResult<Arc<rustls::ServerConfig>> {
        let mut roots = RootCertStore::empty();
        roots.add(self.ca_cert.clone())?;

        let verifier =
            rustls::server::WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider())
                .build()
                .map_err(|e| CryptoError::Tls(e.to_string()))?;

        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.server_key.to_vec()));
        let config = rustls::ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(vec![self.server_cert.clone()], key)?;

        Ok(Arc::new(config))
    }
}

impl fmt::Debug for ServerTlsPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTlsPayload")
            .field("server_cert_len", &self.server_cert.len())
            .field("ca_cert_len", &self.ca_cert.len())
            .finish_non_exhaustive()
    }
}
