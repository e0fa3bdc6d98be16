//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::LauncherConfig;

/// Upper bound on the wrapped-token expiry (one hour).
pub const MAX_WRAP_TTL_SECS: u64 = 3600;

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &LauncherConfig) -> ConfigResult<()> {
    validate_bootstrap(config)?;
    validate_container(config)?;
    Ok(())
}

fn validate_bootstrap(config: &LauncherConfig) -> ConfigResult<()> {
    let b = &config.bootstrap;

    // A zero TTL would ask the wrapping service for a non-expiring token.
    if b.wrap_ttl_secs == 0 || b.wrap_ttl_secs > MAX_WRAP_TTL_SECS {
        return Err(ConfigError::ValidationError {
            field: "bootstrap.wrap_ttl_secs".to_owned(),
            message: format!("wrap_ttl_secs must be between 1 and {MAX_WRAP_TTL_SECS}"),
        });
    }

    if b.ca_validity_secs == 0 || b.ca_validity_secs < b.wrap_ttl_secs {
        return Err(ConfigError::ValidationError {
            field: "bootstrap.ca_validity_secs".to_owned(),
            message: format!(
                "ca_validity_secs must be non-zero and at least wrap_ttl_secs ({})",
                b.wrap_ttl_secs
            ),
        });
    }

    if b.server_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bootstrap.server_name".to_owned(),
            message: "server_name must not be empty".to_owned(),
        });
    }

    Ok(())
}

fn validate_container(config: &LauncherConfig) -> ConfigResult<()> {
    let c = &config.container;

    if c.runtime.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "container.runtime".to_owned(),
            message: "runtime must not be empty".to_owned(),
        });
    }

    if c.managed_by_label.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "container.managed_by_label".to_owned(),
            message: "managed_by_label must not be empty".to_owned(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::ValidationError { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&LauncherConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = LauncherConfig::default();
        config.bootstrap.wrap_ttl_secs = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "bootstrap.wrap_ttl_secs");
    }

    #[test]
    fn test_ttl_upper_bound() {
        let mut config = LauncherConfig::default();
        config.bootstrap.wrap_ttl_secs = MAX_WRAP_TTL_SECS;
        assert!(validate(&config).is_ok());
        config.bootstrap.wrap_ttl_secs = 3601;
        config.bootstrap.ca_validity_secs = 7200;
        assert_eq!(field_of(validate(&config).unwrap_err()), "bootstrap.wrap_ttl_secs");
    }

    #[test]
    fn test_ca_validity_must_cover_ttl() {
        let mut config = LauncherConfig::default();
        config.bootstrap.ca_validity_secs = 30;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "bootstrap.ca_validity_secs"
        );
    }

    #[test]
    fn test_empty_strings_rejected() {
        let mut config = LauncherConfig::default();
        config.bootstrap.server_name = " ".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "bootstrap.server_name");

        let mut config = LauncherConfig::default();
        config.container.runtime = String::new();
        assert_eq!(field_of(validate(&config).unwrap_err()), "container.runtime");

        let mut config = LauncherConfig::default();
        config.container.managed_by_label = String::new();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "container.managed_by_label"
        );
    }
}
