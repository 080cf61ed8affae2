//! Configuration loading for the Jasmin gateway daemons.
//!
//! Configuration is split into two categories, mirroring the separation
//! between what a process cannot change once bound and what only seeds
//! state the runtime (UCS, RE) takes ownership of afterwards:
//!
//! - **Infrastructure** (`InfraConfig`): AMQP/Redis connection info, bind
//!   addresses, storage paths, telemetry - fixed for the process lifetime.
//! - **Runtime defaults** (`RuntimeDefaults`): seed values for newly
//!   created connectors/credentials; the UCS and admin RPC surface own
//!   them from then on.
//!
//! # Config file locations
//!
//! Files are loaded in order (later wins), then environment variables
//! (`JASMIN_*`) are applied on top:
//! 1. `/etc/jasmin/jasmin.toml` (system)
//! 2. `~/.config/jasmin/jasmin.toml` (user)
//! 3. `./jasmin.toml` (local override, or an explicit `--config` path)

pub mod defaults;
pub mod infra;
pub mod loader;

pub use defaults::{ConnectorDefaults, RetrialRule, RuntimeDefaults, SubmitDefaults, ThrowerDefaults};
pub use infra::{AdminConfig, AmqpConfig, HttpConfig, InfraConfig, PathsConfig, RedisConfig, SmppServerConfig};
pub use loader::{ConfigError, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete Jasmin gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JasminConfig {
    #[serde(flatten)]
    pub infra: InfraConfig,
    #[serde(default)]
    pub defaults: RuntimeDefaults,
}

impl JasminConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = loader::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, with `config_path` (e.g. a `--config` flag)
    /// taking precedence over the local `./jasmin.toml` override.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = loader::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files/env vars contributed.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        loader::load_with_sources_from(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_ports() {
        let config = JasminConfig::default();
        assert_eq!(config.infra.http.port, 1401);
        assert_eq!(config.infra.smpp_server.port, 2775);
    }

    #[test]
    fn load_works_with_no_config_files_present() {
        let config = JasminConfig::load().unwrap();
        assert_eq!(config.infra.amqp.exchange, "messaging");
    }
}
