//! SHA-256 artifact checksums.
//!
//! Plugin binaries and container images are pinned by a SHA-256 digest
//! recorded in the plugin descriptor. The process backend hashes the
//! resolved binary and refuses to execute it on mismatch.

use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, CryptoResult};

/// Read buffer used when hashing artifacts from disk.
const HASH_CHUNK: usize = 64 * 1024;

/// Hash algorithm used for artifact integrity checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 (FIPS 180-4).
    #[default]
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Digest length in bytes.
    pub const LEN: usize = 32;

    /// Hash arbitrary data.
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidDigestLength`] if the slice is not
    /// exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] = slice
            .try_into()
            .map_err(|_| CryptoError::InvalidDigestLength {
                expected: Self::LEN,
                actual: slice.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Decode from a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or has the wrong length.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHexEncoding)?;
        Self::from_slice(&bytes)
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Constant-time comparison against another digest.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    /// Stream a reader through SHA-256.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IoError`] if reading fails.
    pub fn digest_reader(mut reader: impl Read) -> CryptoResult<Self> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK];
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| CryptoError::IoError(e.to_string()))?;
            if n == 0 {
                break;
            }
            hasher.update(buf.get(..n).unwrap_or_default());
        }
        Ok(Self(hasher.finalize().into()))
    }

    /// Hash the file at `path` and compare it with this digest.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IoError`] if the file cannot be read, or
    /// [`CryptoError::ChecksumMismatch`] if the digests differ.
    pub fn verify_file(&self, path: &Path) -> CryptoResult<()> {
        let file = std::fs::File::open(path)
            .map_err(|e| CryptoError::IoError(format!("{}: {e}", path.display())))?;
        let actual = Self::digest_reader(std::io::BufReader::new(file))?;
        if !self.matches(&actual) {
            return Err(CryptoError::ChecksumMismatch {
                expected: self.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({})", self.to_hex())
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Sha256Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
