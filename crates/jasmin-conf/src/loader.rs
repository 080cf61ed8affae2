//! Config file discovery, loading, and environment variable overlay.

use crate::JasminConfig;
use std::env;
use std::path::{Path, PathBuf};
use toml::Value;

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations, in load order (later
/// wins): system, user, local/CLI override. Only returns files that exist.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/jasmin/jasmin.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("jasmin/jasmin.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("jasmin.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Parse one TOML file into a partial `toml::Value` table for merging.
fn load_table(path: &Path) -> Result<Value, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    contents.parse::<Value>().map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Recursively merge `overlay` into `base`, with `overlay` taking
/// precedence leaf-by-leaf (tables merge key-wise; any other value type is
/// replaced wholesale).
fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Table(mut base_table), Value::Table(overlay_table)) => {
            for (k, v) in overlay_table {
                let merged = match base_table.remove(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => v,
                };
                base_table.insert(k, merged);
            }
            Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load configuration from all standard sources plus an optional explicit
/// path, then apply environment overrides.
pub fn load_with_sources_from(
    config_path: Option<&Path>,
) -> Result<(JasminConfig, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();
    let mut merged = Value::Table(Default::default());

    for path in discover_config_files_with_override(config_path) {
        let table = load_table(&path)?;
        merged = merge_values(merged, table);
        sources.files.push(path);
    }

    let mut config: JasminConfig = merged.try_into().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: PathBuf::from("<merged>"),
        message: e.to_string(),
    })?;

    apply_env_overrides(&mut config, &mut sources);

    Ok((config, sources))
}

/// Apply environment variable overrides (`JASMIN_*`), highest precedence.
pub fn apply_env_overrides(config: &mut JasminConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("JASMIN_AMQP_HOST") {
        config.infra.amqp.host = v;
        sources.env_overrides.push("JASMIN_AMQP_HOST".to_string());
    }
    if let Ok(v) = env::var("JASMIN_AMQP_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.amqp.port = port;
            sources.env_overrides.push("JASMIN_AMQP_PORT".to_string());
        }
    }
    if let Ok(v) = env::var("JASMIN_REDIS_HOST") {
        config.infra.redis.host = v;
        sources.env_overrides.push("JASMIN_REDIS_HOST".to_string());
    }
    if let Ok(v) = env::var("JASMIN_REDIS_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.redis.port = port;
            sources.env_overrides.push("JASMIN_REDIS_PORT".to_string());
        }
    }
    if let Ok(v) = env::var("JASMIN_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.http.port = port;
            sources.env_overrides.push("JASMIN_HTTP_PORT".to_string());
        }
    }
    if let Ok(v) = env::var("JASMIN_STORE_DIR") {
        config.infra.paths.store_dir = expand_path(&v);
        sources.env_overrides.push("JASMIN_STORE_DIR".to_string());
    }
    if let Ok(v) = env::var("JASMIN_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("JASMIN_LOG_LEVEL".to_string());
    }
    // Standard tracing-subscriber knob takes precedence if set.
    if let Ok(v) = env::var("RUST_LOG") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn expand_path_absolute_is_unchanged() {
        assert_eq!(expand_path("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn merge_values_overlay_wins_on_leaf() {
        let base: Value = "[amqp]\nhost = \"a\"\nport = 1\n".parse().unwrap();
        let overlay: Value = "[amqp]\nhost = \"b\"\n".parse().unwrap();
        let merged = merge_values(base, overlay);
        let amqp = merged.get("amqp").unwrap();
        assert_eq!(amqp.get("host").unwrap().as_str(), Some("b"));
        assert_eq!(amqp.get("port").unwrap().as_integer(), Some(1));
    }

    #[test]
    fn discover_config_files_does_not_panic() {
        let _ = discover_config_files_with_override(None);
    }
}
