//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; Rings of buckets kept resident around the viewer (0-8, default: 1 = 3x3 block)
retention_radius = {}
; Steps an unused tile survives before eviction (default: 120)
grace_steps = {}
; Steps before the first retry of a failed load; doubles per failure (default: 60)
retry_backoff_steps = {}
; Ceiling for the retry delay (default: 3600)
max_retry_backoff_steps = {}
; Tile loads in flight at once (1-64, default: 8)
max_concurrent_loads = {}

[loader]
; Where tiles come from:
;   directory - <directory>/<key>.egrd (or .egrd.gz)
;   http      - <base_url>/<key>.egrd
;   synthetic - generated terrain, for testing
kind = {}
directory = {}
base_url = {}

[logging]
directory = {}
file = {}
"#,
        config.cache.retention_radius,
        config.cache.grace_steps,
        config.cache.retry_backoff_steps,
        config.cache.max_retry_backoff_steps,
        config.cache.max_concurrent_loads,
        config.loader.kind,
        path_to_string(&config.loader.directory),
        config.loader.base_url.as_deref().unwrap_or(""),
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Formats a path, abbreviating the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
