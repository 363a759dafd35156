//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.hostlink/config.toml` (user)
//! 3. Merge the explicit file, if one was given
//! 4. Apply `HOSTLINK_*` env fallbacks for fields no file set
//! 5. Deserialize the merged tree → `Config`
//! 6. Validate

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration with layered file precedence.
///
/// `home_override` replaces the `~/.hostlink` directory. An explicit file
/// that does not exist is an error; a missing user file is skipped.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(explicit: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<Config> {
    load_with_env(explicit, home_override, &collect_env_vars())
}

/// [`load`] with a fixed set of environment variables.
pub(crate) fn load_with_env(
    explicit: Option<&Path>,
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<Config> {
    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut file_fields = HashSet::new();

    // 2. User config.
    let user_path = match home_override {
        Some(dir) => dir.join("config.toml"),
        None => home_directory()?.join(".hostlink").join("config.toml"),
    };
    if let Some(overlay) = try_load_file(&user_path)? {
        record_fields(&overlay, "", &mut file_fields);
        deep_merge(&mut merged, overlay);
        info!(path = %user_path.display(), "loaded user config");
    }

    // 3. Explicit config.
    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        record_fields(&overlay, "", &mut file_fields);
        deep_merge(&mut merged, overlay);
        info!(path = %path.display(), "loaded explicit config");
    }

    // 4. Env fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &file_fields, env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    // 5. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 6. Validate.
    validate::validate(&config)?;
    Ok(config)
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(oversized(path, metadata.len()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Reads once and checks the size afterwards so there is no window between
/// a stat and the read.
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

    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(oversized(path, len));
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

fn oversized(path: &Path, len: u64) -> ConfigError {
    ConfigError::ValidationError {
        field: path.display().to_string(),
        message: format!(
            "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
        ),
    }
}

/// Merge `overlay` into `base`. Tables merge key by key; anything else
/// replaces the base value.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_table.insert(key, value);
                    },
                }
            }
        },
        (base, overlay) => *base = overlay,
    }
}

/// Collect the dotted paths of every leaf value in `val`.
fn record_fields(val: &toml::Value, prefix: &str, fields: &mut HashSet<String>) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            record_fields(child, &path, fields);
        }
    } else {
        fields.insert(prefix.to_owned());
    }
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_with_empty_home() {
        let home = tempfile::tempdir().unwrap();
        let config = load_with_env(None, Some(home.path()), &no_env()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_explicit_overrides_user() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[logging]\nlevel = \"debug\"\nformat = \"json\"\n",
        )
        .unwrap();
        let explicit = home.path().join("explicit.toml");
        std::fs::write(&explicit, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = load_with_env(Some(&explicit), Some(home.path()), &no_env()).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_env_is_fallback_only() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[registry]\ndrain_inactive_hosts = true\n",
        )
        .unwrap();
        let env: HashMap<String, String> = [
            ("HOSTLINK_DRAIN_INACTIVE_HOSTS", "false"),
            ("HOSTLINK_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let config = load_with_env(None, Some(home.path()), &env).unwrap();
        assert!(config.registry.drain_inactive_hosts);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let home = tempfile::tempdir().unwrap();
        let missing = home.path().join("nope.toml");
        let result = load_with_env(Some(&missing), Some(home.path()), &no_env());
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_invalid_merged_value_fails_validation() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[logging]\nformat = \"xml\"\n").unwrap();
        let result = load_with_env(None, Some(home.path()), &no_env());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_load_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[registry\n").unwrap();
        assert!(matches!(load_file(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected ValidationError for oversized config, got: {result:?}"
        );
    }

    #[test]
    fn test_deep_merge_keeps_siblings() {
        let mut base: toml::Value = toml::from_str("[logging]\nlevel = \"info\"\nformat = \"compact\"\n").unwrap();
        let overlay: toml::Value = toml::from_str("[logging]\nlevel = \"error\"\n").unwrap();
        deep_merge(&mut base, overlay);
        assert_eq!(base["logging"]["level"].as_str(), Some("error"));
        assert_eq!(base["logging"]["format"].as_str(), Some("compact"));
    }
}
