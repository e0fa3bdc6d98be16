//! Launch error types.
//!
//! Every variant records the operation that failed (`op`) and the innermost
//! cause, so an operator can tell a descriptor problem from a bootstrap or
//! integrity problem at a glance.

use tether_crypto::CryptoError;

use crate::wrapping::WrappingError;

/// Errors from building or starting a plugin launch.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// Malformed or missing descriptor/option fields.
    #[error("{op}: invalid parameter: {message}")]
    InvalidParameter {
        /// Operation that rejected the input.
        op: &'static str,
        /// What was wrong.
        message: String,
    },

    /// The wrapping service could not report the host version.
    #[error("{op}: host version unavailable: {source}")]
    VersionLookup {
        /// Operation that needed the version.
        op: &'static str,
        /// Cause reported by the wrapping service.
        source: WrappingError,
    },

    /// Authority generation, signing or TLS configuration failed.
    #[error("{op}: {source}")]
    Certificate {
        /// Bootstrap step that failed.
        op: &'static str,
        /// Underlying cryptographic failure.
        source: CryptoError,
    },

    /// The wrapping service did not produce a token.
    #[error("{op}: {source}")]
    Wrap {
        /// Operation that requested the token.
        op: &'static str,
        /// Cause reported by the wrapping service.
        source: WrappingError,
    },

    /// Backend-specific translation failed.
    #[error("{op}: {message}")]
    BackendAssembly {
        /// Assembly step that failed.
        op: &'static str,
        /// Why the combination is unsupported.
        message: String,
    },

    /// The caller cancelled the launch.
    #[error("{op}: launch cancelled")]
    Cancelled {
        /// Step that was interrupted.
        op: &'static str,
    },

    /// The on-disk artifact does not match the expected digest.
    #[error("{op}: integrity check failed for {plugin}: {source}")]
    ChecksumMismatch {
        /// Operation that performed the check.
        op: &'static str,
        /// Plugin whose artifact failed verification.
        plugin: String,
        /// Underlying verification failure.
        source: CryptoError,
    },

    /// The factory cannot run this kind of backend.
    #[error("{op}: unsupported backend: {backend}")]
    UnsupportedBackend {
        /// Factory operation.
        op: &'static str,
        /// Backend kind that was refused.
        backend: &'static str,
    },

    /// The process could not be spawned.
    #[error("{op}: failed to spawn {command}: {source}")]
    Spawn {
        /// Factory operation.
        op: &'static str,
        /// Command that failed to start.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Name of the operation that produced this error.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::InvalidParameter { op, .. }
            | Self::VersionLookup { op, .. }
            | Self::Certificate { op, .. }
            | Self::Wrap { op, .. }
            | Self::BackendAssembly { op, .. }
            | Self::Cancelled { op }
            | Self::ChecksumMismatch { op, .. }
            | Self::UnsupportedBackend { op, .. }
            | Self::Spawn { op, .. } => op,
        }
    }

    /// Whether the caller cancelled the launch.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub(crate) fn invalid(op: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            op,
            message: message.into(),
        }
    }

    pub(crate) fn backend(op: &'static str, message: impl Into<String>) -> Self {
        Self::BackendAssembly {
            op,
            message: message.into(),
        }
    }
}

/// Result type for launch operations.
pub type LaunchResult<T> = Result<T, LaunchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_op_and_cause() {
        let err = LaunchError::Wrap {
            op: "wrap server payload",
            source: WrappingError::Unavailable("wrapping service unreachable".into()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("wrap server payload: "));
        assert!(msg.contains("wrapping service unreachable"));
        assert_eq!(err.op(), "wrap server payload");
    }

    #[test]
    fn test_cancelled() {
        let err = LaunchError::Cancelled { op: "lookup host version" };
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "lookup host version: launch cancelled");
    }
}
