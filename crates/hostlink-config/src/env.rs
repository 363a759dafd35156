//! `HOSTLINK_*` environment variable fallbacks.
//!
//! Variables only fill fields that no config file set. A value written in a
//! file always wins over the environment.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Prefix shared by every recognised variable.
pub const ENV_PREFIX: &str = "HOSTLINK_";

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Bool,
    Str,
    List,
}

struct EnvMapping {
    var: &'static str,
    field: &'static str,
    kind: EnvKind,
}

const MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var: "HOSTLINK_DRAIN_INACTIVE_HOSTS",
        field: "registry.drain_inactive_hosts",
        kind: EnvKind::Bool,
    },
    EnvMapping {
        var: "HOSTLINK_LOG_LEVEL",
        field: "logging.level",
        kind: EnvKind::Str,
    },
    EnvMapping {
        var: "HOSTLINK_LOG_FORMAT",
        field: "logging.format",
        kind: EnvKind::Str,
    },
    EnvMapping {
        var: "HOSTLINK_LOG_DIRECTIVES",
        field: "logging.directives",
        kind: EnvKind::List,
    },
];

/// Snapshot every `HOSTLINK_*` variable of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply env var values to fields not present in `file_fields`.
///
/// `file_fields` holds the dotted paths set by any loaded config file.
/// Returns the number of fields filled from the environment.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a variable cannot be parsed into the
/// field's type.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    file_fields: &HashSet<String>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied = 0usize;
    for mapping in MAPPINGS {
        if file_fields.contains(mapping.field) {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var) else {
            continue;
        };
        let value = parse_value(mapping, raw)?;
        set_path(merged, mapping.field, value);
        debug!(var = mapping.var, field = mapping.field, "applied env fallback");
        applied = applied.saturating_add(1);
    }
    Ok(applied)
}

fn parse_value(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    match mapping.kind {
        EnvKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Ok(toml::Value::Boolean(false)),
            other => Err(ConfigError::EnvError {
                var: mapping.var.to_owned(),
                message: format!("expected a boolean, got '{other}'"),
            }),
        },
        EnvKind::Str => Ok(toml::Value::String(raw.trim().to_owned())),
        EnvKind::List => Ok(toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_owned()))
                .collect(),
        )),
    }
}

/// Set a `section.key` path inside `root`, creating the section if needed.
fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let Some((section, key)) = path.split_once('.') else {
        return;
    };
    if !root.is_table() {
        *root = toml::Value::Table(toml::Table::new());
    }
    let Some(root_table) = root.as_table_mut() else {
        return;
    };
    let section_value = root_table
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    if !section_value.is_table() {
        *section_value = toml::Value::Table(toml::Table::new());
    }
    if let Some(section_table) = section_value.as_table_mut() {
        section_table.insert(key.to_owned(), value);
    }
}
