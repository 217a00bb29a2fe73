//! Configuration management for cpa.
//!
//! Configuration can be set via environment variables:
//! - `CPA_HOME` - Optional. State directory. Defaults to `~/.cpa`.
//! - `CPA_CONFIG_FILE` - Optional. User config (YAML). Defaults to `<state>/config.yaml`.
//! - `CPA_APPLY_ENV` - Optional. Export `env` credentials into this process. Defaults to `true`.
//! - `CPA_CLI_PROGRAM` - Optional. Program wrapper scripts call back into. Defaults to `cpa`.
//! - `CPA_COMMAND_TIMEOUT_SECS` - Optional. Tool invocation timeout. Defaults to `60`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::secrets::{EnvMode, StoreOptions, StorePaths};
use crate::util::env_var_bool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-user state directory
    pub state_dir: PathBuf,

    /// User-facing YAML config with platform endpoints and API keys
    pub config_file: PathBuf,

    /// Export `env` credentials into the ambient environment
    pub apply_env: bool,

    /// Program name embedded in wrapper scripts
    pub cli_program: String,

    /// Timeout for validated tool invocations
    pub command_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse
    /// or `CPA_CLI_PROGRAM` is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let state_dir = std::env::var("CPA_HOME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(crate::util::home_dir()).join(".cpa"));

        let config_file = std::env::var("CPA_CONFIG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.join("config.yaml"));

        let cli_program = std::env::var("CPA_CLI_PROGRAM").unwrap_or_else(|_| "cpa".to_string());
        if cli_program.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "CPA_CLI_PROGRAM".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let timeout_secs: u64 = std::env::var("CPA_COMMAND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .trim()
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("CPA_COMMAND_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        Ok(Self {
            state_dir,
            config_file,
            apply_env: env_var_bool("CPA_APPLY_ENV", true),
            cli_program,
            command_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create a config rooted at `state_dir` with defaults (useful for testing).
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            config_file: state_dir.join("config.yaml"),
            state_dir,
            apply_env: true,
            cli_program: "cpa".to_string(),
            command_timeout: Duration::from_secs(60),
        }
    }

    pub fn machine_key_file(&self) -> PathBuf {
        self.state_dir.join(".machine_key")
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::in_dir(&self.state_dir)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            env_mode: if self.apply_env {
                EnvMode::Process
            } else {
                EnvMode::Deferred
            },
            cli_program: self.cli_program.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_state_dir_layout() {
        let config = Config::new(PathBuf::from("/tmp/cpa-state"));
        assert_eq!(config.config_file, PathBuf::from("/tmp/cpa-state/config.yaml"));
        assert_eq!(
            config.machine_key_file(),
            PathBuf::from("/tmp/cpa-state/.machine_key")
        );
        assert_eq!(
            config.store_paths().store_file,
            PathBuf::from("/tmp/cpa-state/credentials.json.enc")
        );
        assert_eq!(config.store_options().env_mode, EnvMode::Process);
    }

    #[test]
    fn test_deferred_mode_when_apply_env_disabled() {
        let mut config = Config::new(PathBuf::from("/tmp/cpa-state"));
        config.apply_env = false;
        assert_eq!(config.store_options().env_mode, EnvMode::Deferred);
    }
}
