//! Launcher-wide settings, converted from [`LauncherConfig`] at the boundary.

use std::time::Duration;

use tether_config::LauncherConfig;
use tether_config::validate::MAX_WRAP_TTL_SECS;

use crate::error::{LaunchError, LaunchResult};

/// Settings shared by every launch a builder performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Expiry requested for the wrapped server credentials. Never zero and
    /// at most [`MAX_WRAP_TTL_SECS`].
    pub wrap_ttl: Duration,
    /// Validity of the per-launch authority and its leaves.
    pub ca_validity: Duration,
    /// Server name on the server leaf and SNI presented by the host.
    pub server_name: String,
    /// OCI runtime used when a descriptor does not name one.
    pub container_runtime: String,
    /// Value of the `managed-by` container label.
    pub managed_by_label: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self::from(&LauncherConfig::default())
    }
}

impl From<&LauncherConfig> for LaunchSettings {
    fn from(config: &LauncherConfig) -> Self {
        Self {
            wrap_ttl: Duration::from_secs(config.bootstrap.wrap_ttl_secs),
            ca_validity: Duration::from_secs(config.bootstrap.ca_validity_secs),
            server_name: config.bootstrap.server_name.clone(),
            container_runtime: config.container.runtime.clone(),
            managed_by_label: config.container.managed_by_label.clone(),
        }
    }
}

impl LaunchSettings {
    /// Check the settings a launch cannot proceed without.
    ///
    /// # Errors
    ///
    /// [`LaunchError::InvalidParameter`] for a zero or over-long token
    /// expiry, or an authority that would expire before the token.
    pub fn validate(&self) -> LaunchResult<()> {
        const OP: &str = "validate launch settings";
        if self.wrap_ttl.is_zero() {
            return Err(LaunchError::invalid(
                OP,
                "wrap ttl must be non-zero; non-expiring tokens are not requested",
            ));
        }
        if self.wrap_ttl > Duration::from_secs(MAX_WRAP_TTL_SECS) {
            return Err(LaunchError::invalid(
                OP,
                format!(
                    "wrap ttl of {}s exceeds the {MAX_WRAP_TTL_SECS}s maximum",
                    self.wrap_ttl.as_secs()
                ),
            ));
        }
        if self.ca_validity < self.wrap_ttl {
            return Err(LaunchError::invalid(
                OP,
                "certificate validity must cover the wrap ttl",
            ));
        }
        if self.server_name.trim().is_empty() {
            return Err(LaunchError::invalid(OP, "server name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_embedded_config() {
        let settings = LaunchSettings::default();
        assert_eq!(settings.wrap_ttl, Duration::from_secs(60));
        assert_eq!(settings.ca_validity, Duration::from_secs(3600));
        assert_eq!(settings.server_name, "localhost");
        assert_eq!(settings.container_runtime, "runsc");
        assert_eq!(settings.managed_by_label, "tether");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_launcher_config() {
        let mut config = LauncherConfig::default();
        config.bootstrap.wrap_ttl_secs = 15;
        config.container.runtime = "runc".to_owned();
        let settings = LaunchSettings::from(&config);
        assert_eq!(settings.wrap_ttl, Duration::from_secs(15));
        assert_eq!(settings.container_runtime, "runc");
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let settings = LaunchSettings {
            wrap_ttl: Duration::ZERO,
            ..LaunchSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(LaunchError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_long_ttl_rejected() {
        let settings = LaunchSettings {
            wrap_ttl: Duration::from_secs(31_536_000),
            ca_validity: Duration::from_secs(31_536_000),
            ..LaunchSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, LaunchError::InvalidParameter { .. }));
        assert!(err.to_string().contains("3600"));
    }

    #[test]
    fn test_max_ttl_accepted() {
        let settings = LaunchSettings {
            wrap_ttl: Duration::from_secs(MAX_WRAP_TTL_SECS),
            ..LaunchSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_short_validity_rejected() {
        let settings = LaunchSettings {
            ca_validity: Duration::from_secs(10),
            ..LaunchSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
