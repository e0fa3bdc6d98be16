//! Wrapping service capability.
//!
//! The host implements [`WrappingClient`] elsewhere (typically on top of its
//! secret store) and injects it into the builder. This crate only consumes
//! the contract: report the host version, report whether memory locking is
//! enforced, and wrap a payload into a single-use, expiring token.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroizing;

/// Errors reported by a [`WrappingClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WrappingError {
    /// The service could not be reached or is not ready.
    #[error("{0}")]
    Unavailable(String),

    /// The service refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// An opaque, single-use, short-lived token produced by the wrapping service.
///
/// The plugin redeems it exactly once to obtain its TLS material. The token
/// value is never logged: `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedToken(Zeroizing<String>);

impl WrappedToken {
    /// Wrap a raw token string returned by the service.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// The token value, for injection into the plugin environment.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the service returned an empty token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for WrappedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WrappedToken([REDACTED])")
    }
}

impl fmt::Display for WrappedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Host capabilities consumed while building a launch configuration.
///
/// Implementations must be safe to call concurrently from several launches.
/// The builder races every async call against the caller's cancellation
/// token and drops the future on cancellation, so implementations must not
/// leave shared state half-updated across an `.await`.
#[async_trait]
pub trait WrappingClient: Send + Sync {
    /// Current host version, injected into every plugin environment.
    async fn host_version(&self) -> Result<String, WrappingError>;

    /// Whether the host enforces memory locking for plugins.
    fn mlock_enabled(&self) -> bool;

    /// Wrap `payload` into a single-use token that expires after `ttl`.
    ///
    /// `ttl` is always non-zero.
    async fn wrap(&self, payload: &[u8], ttl: Duration) -> Result<WrappedToken, WrappingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let token = WrappedToken::new("s.super-secret-token");
        assert_eq!(format!("{token:?}"), "WrappedToken([REDACTED])");
        assert_eq!(token.to_string(), "[REDACTED]");
        assert_eq!(token.expose(), "s.super-secret-token");
        assert!(!token.is_empty());
    }

    #[test]
    fn test_wrapping_error_display() {
        let err = WrappingError::Rejected("ttl too long".into());
        assert_eq!(err.to_string(), "request rejected: ttl too long");
        let err = WrappingError::Unavailable("wrapping service unreachable".into());
        assert_eq!(err.to_string(), "wrapping service unreachable");
    }
}
