//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur while creating or verifying launch credentials.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key pair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Certificate parameters were rejected or signing failed.
    #[error("certificate signing failed: {0}")]
    Signing(String),

    /// The validity window could not be represented.
    #[error("invalid validity window: {0}")]
    InvalidValidity(String),

    /// Building the TLS configuration failed.
    #[error("TLS configuration failed: {0}")]
    Tls(String),

    /// The server payload could not be encoded or decoded.
    #[error("payload encoding failed: {0}")]
    Payload(String),

    /// Invalid digest length.
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidDigestLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid hex encoding.
    #[error("invalid hex encoding")]
    InvalidHexEncoding,

    /// Artifact digest did not match the expected value.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected hex digest.
        expected: String,
        /// Actual hex digest.
        actual: String,
    },

    /// I/O error (e.g. reading an artifact to hash).
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<rcgen::Error> for CryptoError {
    fn from(e: rcgen::Error) -> Self {
        Self::Signing(e.to_string())
    }
}

impl From<rustls::Error> for CryptoError {
    fn from(e: rustls::Error) -> Self {
        Self::Tls(e.to_string())
    }
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
