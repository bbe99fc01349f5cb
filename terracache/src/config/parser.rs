//! INI parsing logic for converting `Ini` → `ConfigFile`.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::{ConfigFile, LoaderKind};
use crate::manager::{MAX_CONCURRENT_LOADS, MAX_RETENTION_RADIUS_TILES};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("retention_radius") {
            let radius: u32 = parse_number("cache", "retention_radius", v)?;
            config.cache.retention_radius = radius.min(MAX_RETENTION_RADIUS_TILES);
        }
        if let Some(v) = section.get("grace_steps") {
            config.cache.grace_steps = parse_number("cache", "grace_steps", v)?;
        }
        if let Some(v) = section.get("retry_backoff_steps") {
            let steps: u64 = parse_number("cache", "retry_backoff_steps", v)?;
            if steps == 0 {
                return Err(invalid(
                    "cache",
                    "retry_backoff_steps",
                    v,
                    "must be at least 1",
                ));
            }
            config.cache.retry_backoff_steps = steps;
        }
        if let Some(v) = section.get("max_retry_backoff_steps") {
            config.cache.max_retry_backoff_steps =
                parse_number("cache", "max_retry_backoff_steps", v)?;
        }
        if let Some(v) = section.get("max_concurrent_loads") {
            let loads: usize = parse_number("cache", "max_concurrent_loads", v)?;
            config.cache.max_concurrent_loads = loads.clamp(1, MAX_CONCURRENT_LOADS);
        }
    }

    // [loader] section
    if let Some(section) = ini.section(Some("loader")) {
        if let Some(v) = section.get("kind") {
            config.loader.kind = LoaderKind::from_str(v).map_err(|_| {
                invalid(
                    "loader",
                    "kind",
                    v,
                    "must be one of: directory, http, synthetic",
                )
            })?;
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.loader.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("base_url") {
            let v = v.trim();
            if !v.is_empty() {
                if !(v.starts_with("http://") || v.starts_with("https://")) {
                    return Err(invalid(
                        "loader",
                        "base_url",
                        v,
                        "must start with http:// or https://",
                    ));
                }
                config.loader.base_url = Some(v.to_string());
            }
        }
    }

    if config.loader.kind == LoaderKind::Http && config.loader.base_url.is_none() {
        return Err(invalid(
            "loader",
            "base_url",
            "",
            "required when kind = http",
        ));
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
