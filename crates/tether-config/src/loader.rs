//! Config file discovery and layered loading.
//!
//! Implements the `LauncherConfig::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/tether/launcher.toml` (system)
//! 3. Merge `$TETHER_HOME/launcher.toml`, else `~/.tether/launcher.toml` (user)
//! 4. Apply `TETHER_*` environment overrides
//! 5. Deserialize merged tree → `LauncherConfig`
//! 6. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::LauncherConfig;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// System-wide config path.
const SYSTEM_CONFIG_PATH: &str = "/etc/tether/launcher.toml";

/// Config file name inside the tether home directory.
const CONFIG_FILE_NAME: &str = "launcher.toml";

/// Overrides the tether home directory.
pub const TETHER_HOME_ENV: &str = "TETHER_HOME";

/// Environment overrides: variable name → dotted config path.
const ENV_OVERRIDES: &[(&str, &str, EnvKind)] = &[
    ("TETHER_WRAP_TTL_SECS", "bootstrap.wrap_ttl_secs", EnvKind::Integer),
    ("TETHER_CA_VALIDITY_SECS", "bootstrap.ca_validity_secs", EnvKind::Integer),
    ("TETHER_CONTAINER_RUNTIME", "container.runtime", EnvKind::String),
];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Integer,
    String,
}

/// A loaded configuration plus the files that contributed to it.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: LauncherConfig,
    /// Config files that were found and merged, in load order.
    pub loaded_files: Vec<String>,
}

/// Load the launcher configuration with layered file precedence.
///
/// `home_override` is treated as the tether home directory itself (the
/// directory containing `launcher.toml`), bypassing `TETHER_HOME` and
/// `~/.tether`. The system layer is skipped when an override is given.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, an environment
/// override cannot be parsed, or the merged configuration fails validation.
pub fn load(home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    load_with_env(home_override, &collect_env_vars())
}

pub(crate) fn load_with_env(
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    // 2. System config.
    let system_path = PathBuf::from(SYSTEM_CONFIG_PATH);
    if home_override.is_none()
        && let Some(overlay) = try_load_file(&system_path)?
    {
        deep_merge(&mut merged, &overlay);
        loaded_files.push(system_path.display().to_string());
        info!(path = %system_path.display(), "loaded system config");
    }

    // 3. User config.
    let user_dir = match home_override {
        Some(dir) => dir.to_path_buf(),
        None => tether_home(env_vars)?,
    };
    let user_path = user_dir.join(CONFIG_FILE_NAME);
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, &overlay);
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    // 4. Environment overrides.
    let env_count = apply_env_overrides(&mut merged, env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment overrides");
    }

    // 5. Deserialize.
    let config: LauncherConfig =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 6. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering, no env overrides).
///
/// Missing sections fall back to their defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<LauncherConfig> {
    let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;

    let config: LauncherConfig =
        overlay
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: path.display().to_string(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Deep-merge `overlay` into `base`. Tables merge key by key; any other
/// value replaces the base value.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

fn apply_env_overrides(
    merged: &mut toml::Value,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut count = 0_usize;
    for (var_name, path, kind) in ENV_OVERRIDES {
        let Some(raw) = env_vars.get(*var_name) else {
            continue;
        };
        let value = match kind {
            EnvKind::Integer => {
                let parsed: i64 = raw.trim().parse().map_err(|_| ConfigError::EnvError {
                    var_name: (*var_name).to_owned(),
                    message: format!("expected a non-negative integer, got {raw:?}"),
                })?;
                if parsed < 0 {
                    return Err(ConfigError::EnvError {
                        var_name: (*var_name).to_owned(),
                        message: format!("expected a non-negative integer, got {raw:?}"),
                    });
                }
                toml::Value::Integer(parsed)
            },
            EnvKind::String => toml::Value::String(raw.clone()),
        };
        set_path(merged, path, value);
        count = count.saturating_add(1);
        debug!(var = *var_name, field = *path, "applied environment override");
    }
    Ok(count)
}

/// Set a dotted `section.key` path, creating intermediate tables.
fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        let toml::Value::Table(table) = current else {
            return;
        };
        if parts.peek().is_none() {
            table.insert(part.to_owned(), value);
            return;
        }
        current = table
            .entry(part.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("TETHER_"))
        .collect()
}

/// Resolve the tether home directory: `$TETHER_HOME`, else `~/.tether`.
fn tether_home(env_vars: &HashMap<String, String>) -> ConfigResult<PathBuf> {
    if let Some(home) = env_vars.get(TETHER_HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".tether"))
        .ok_or(ConfigError::NoHomeDir)
}
