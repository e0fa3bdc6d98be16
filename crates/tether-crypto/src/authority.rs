//! Ephemeral certificate authority.
//!
//! A fresh authority is generated for every plugin launch and lives only in
//! memory for the duration of that launch. It signs exactly one client leaf
//! (kept by the host) and one server leaf (handed to the plugin through the
//! wrapping service).

use std::fmt;
use std::time::Duration;

use rand::RngCore;
use rand::rngs::OsRng;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
    SerialNumber,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Backdate `not_before` to tolerate small clock skew between host and plugin.
const CLOCK_SKEW_ALLOWANCE: time::Duration = time::Duration::seconds(30);

/// Common name of every launch authority.
const CA_COMMON_NAME: &str = "tether ephemeral launch CA";

/// Which side of the channel a leaf certificate authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafRole {
    /// The host, connecting to the plugin.
    Client,
    /// The plugin, accepting the host's connection.
    Server,
}

impl LeafRole {
    fn usage(self) -> ExtendedKeyUsagePurpose {
        match self {
            Self::Client => ExtendedKeyUsagePurpose::ClientAuth,
            Self::Server => ExtendedKeyUsagePurpose::ServerAuth,
        }
    }

    fn common_name(self) -> &'static str {
        match self {
            Self::Client => "tether plugin host",
            Self::Server => "tether plugin",
        }
    }
}

/// A self-signed certificate authority that exists for one launch.
///
/// The signing key is held by `rcgen` and is dropped together with the
/// authority. It is never serialized.
pub struct EphemeralCa {
    cert: Certificate,
    key: KeyPair,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

impl EphemeralCa {
    /// Generate a new authority valid for `validity` from now.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidValidity`] for a zero or unrepresentable
    /// window, [`CryptoError::KeyGeneration`] if the key cannot be created, or
    /// [`CryptoError::Signing`] if self-signing fails.
    pub fn generate(validity: Duration) -> CryptoResult<Self> {
        let (not_before, not_after) = validity_window(validity)?;

        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(CA_COMMON_NAME);
        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.serial_number = Some(random_serial());
        params.not_before = not_before;
        params.not_after = not_after;

        let cert = params.self_signed(&key)?;

        Ok(Self {
            cert,
            key,
            not_before,
            not_after,
        })
    }

    /// DER encoding of the authority certificate.
    #[must_use]
    pub fn cert_der(&self) -> &CertificateDer<'static> {
        self.cert.der()
    }

    /// PEM encoding of the authority certificate.
    #[must_use]
    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    /// End of the validity window.
    #[must_use]
    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    /// Issue a leaf certificate for `role`, valid for `server_name`.
    ///
    /// The leaf inherits the authority's validity window so it can never
    /// outlive its issuer.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyGeneration`] or [`CryptoError::Signing`].
    pub fn issue(&self, role: LeafRole, server_name: &str) -> CryptoResult<IssuedLeaf> {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        let mut params = CertificateParams::new(vec![server_name.to_owned()])?;
        params.distinguished_name = distinguished_name(role.common_name());
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
            KeyUsagePurpose::KeyAgreement,
        ];
        params.extended_key_usages = vec![role.usage()];
        params.serial_number = Some(random_serial());
        params.not_before = self.not_before;
        params.not_after = self.not_after;
        params.use_authority_key_identifier_extension = true;

        let cert = params.signed_by(&key, &self.cert, &self.key)?;

        Ok(IssuedLeaf {
            role,
            cert_der: cert.der().clone(),
            key_der: Zeroizing::new(key.serialize_der()),
        })
    }
}

impl fmt::Debug for EphemeralCa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralCa")
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// A certificate and its private key, signed by an [`EphemeralCa`].
///
/// Key bytes are zeroized on drop.
pub struct IssuedLeaf {
    role: LeafRole,
    cert_der: CertificateDer<'static>,
    key_der: Zeroizing<Vec<u8>>,
}

impl IssuedLeaf {
    /// Which side of the channel this leaf authenticates.
    #[must_use]
    pub fn role(&self) -> LeafRole {
        self.role
    }

    /// DER encoding of the certificate.
    #[must_use]
    pub fn cert_der(&self) -> &CertificateDer<'static> {
        &self.cert_der
    }

    /// The private key as a `rustls` PKCS#8 key (copies the key bytes).
    pub(crate) fn private_key_der(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.to_vec()))
    }

    /// Raw PKCS#8 key bytes, for the sealed server payload only.
    pub(crate) fn key_der(&self) -> &[u8] {
        &self.key_der
    }
}

impl fmt::Debug for IssuedLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedLeaf")
            .field("role", &self.role)
            .field("cert_len", &self.cert_der.len())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, "tether");
    dn.push(DnType::CommonName, common_name);
    dn
}

fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    // Keep the DER INTEGER positive.
    bytes[0] &= 0x7f;
    SerialNumber::from_slice(&bytes)
}

fn validity_window(validity: Duration) -> CryptoResult<(OffsetDateTime, OffsetDateTime)> {
    if validity.is_zero() {
        return Err(CryptoError::InvalidValidity(
            "validity window must be non-zero".into(),
        ));
    }
    let span = time::Duration::try_from(validity)
        .map_err(|e| CryptoError::InvalidValidity(e.to_string()))?;

    let now = OffsetDateTime::now_utc();
    let not_before = now
        .checked_sub(CLOCK_SKEW_ALLOWANCE)
        .ok_or_else(|| CryptoError::InvalidValidity("not_before underflow".into()))?;
    let not_after = now
        .checked_add(span)
        .ok_or_else(|| CryptoError::InvalidValidity("not_after overflow".into()))?;
    Ok((not_before, not_after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ca() {
        let ca = EphemeralCa::generate(Duration::from_secs(600)).unwrap();
        assert!(!ca.cert_der().is_empty());
        assert!(ca.cert_pem().starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(ca.not_after() > OffsetDateTime::now_utc());
    }

    #[test]
    fn test_zero_validity_rejected() {
        let err = EphemeralCa::generate(Duration::ZERO).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidValidity(_)));
    }

    #[test]
    fn test_each_ca_is_unique() {
        let a = EphemeralCa::generate(Duration::from_secs(60)).unwrap();
        let b = EphemeralCa::generate(Duration::from_secs(60)).unwrap();
        assert_ne!(a.cert_der(), b.cert_der());
    }

    #[test]
    fn test_issue_leaves() {
        let ca = EphemeralCa::generate(Duration::from_secs(600)).unwrap();
        let client = ca.issue(LeafRole::Client, "localhost").unwrap();
        let server = ca.issue(LeafRole::Server, "localhost").unwrap();

        assert_eq!(client.role(), LeafRole::Client);
        assert_eq!(server.role(), LeafRole::Server);
        assert_ne!(client.cert_der(), server.cert_der());
        assert!(!server.key_der().is_empty());
    }

    #[test]
    fn test_leaf_debug_redacts_key() {
        let ca = EphemeralCa::generate(Duration::from_secs(600)).unwrap();
        let leaf = ca.issue(LeafRole::Server, "localhost").unwrap();
        let debug = format!("{leaf:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("key_der"));
    }
}
