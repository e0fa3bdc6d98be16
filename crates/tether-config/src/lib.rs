#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered launcher configuration for tether.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tether_config::LauncherConfig;
//!
//! // defaults → system → user → env
//! let resolved = LauncherConfig::load().unwrap();
//! println!("wrap ttl: {}s", resolved.config.bootstrap.wrap_ttl_secs);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`TETHER_WRAP_TTL_SECS`,
//!    `TETHER_CA_VALIDITY_SECS`, `TETHER_CONTAINER_RUNTIME`)
//! 2. **User** (`$TETHER_HOME/launcher.toml`, else `~/.tether/launcher.toml`)
//! 3. **System** (`/etc/tether/launcher.toml`)
//! 4. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! This crate has no dependencies on other tether crates.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use types::*;

impl LauncherConfig {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load() -> ConfigResult<ResolvedConfig> {
        loader::load(None)
    }

    /// Load configuration with an explicit tether home directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(home_dir: &std::path::Path) -> ConfigResult<ResolvedConfig> {
        loader::load(Some(home_dir))
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
