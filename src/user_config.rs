//! User-facing platform configuration.
//!
//! Persists per-platform endpoints and API keys to a YAML file (by default
//! `~/.cpa/config.yaml`):
//!
//! ```yaml
//! platforms:
//!   glm:
//!     base_url: https://open.bigmodel.cn/api/anthropic
//!     encrypted_api_key: <base64 salt ‖ iv ‖ tag ‖ ciphertext>
//!   kimi:
//!     api_key: sk-legacy-plaintext
//! ```
//!
//! `api_key` is the legacy plaintext field. When a password is supplied the
//! `encrypted_api_key` field is authoritative and `api_key` is not read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{CryptoError, PasswordCodec};

#[derive(Debug, Error)]
pub enum UserConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Settings for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Plaintext API key (legacy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API key encrypted with [`PasswordCodec`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_api_key: Option<String>,
}

/// The whole YAML document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformConfig>,
}

impl UserConfig {
    /// Load from `path`; a missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self, UserConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using empty config", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| UserConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Save atomically, owner-readable only.
    pub fn save(&self, path: &Path) -> Result<(), UserConfigError> {
        let contents = serde_yaml::to_string(self)?;
        crate::util::write_atomic(path, contents.as_bytes(), true).map_err(|source| {
            UserConfigError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn platform(&self, platform_id: &str) -> Option<&PlatformConfig> {
        self.platforms.get(platform_id)
    }

    pub fn set_base_url(&mut self, platform_id: &str, base_url: Option<String>) {
        self.platforms
            .entry(platform_id.to_string())
            .or_default()
            .base_url = base_url;
    }

    /// Store an API key. With a password only the encrypted field is kept and
    /// any plaintext key is dropped.
    pub fn set_api_key(
        &mut self,
        platform_id: &str,
        api_key: &str,
        password: Option<&str>,
    ) -> Result<(), UserConfigError> {
        let entry = self.platforms.entry(platform_id.to_string()).or_default();
        match password {
            Some(password) => {
                entry.encrypted_api_key = Some(PasswordCodec::new().encrypt(api_key, password)?);
                entry.api_key = None;
            }
            None => {
                tracing::warn!(
                    "Storing API key for {} in plaintext; pass a password to encrypt it",
                    platform_id
                );
                entry.api_key = Some(api_key.to_string());
            }
        }
        Ok(())
    }

    /// Resolve the API key for a platform.
    ///
    /// With a password the encrypted field takes priority and a decryption
    /// failure is an error. Falls back to the plaintext field only when no
    /// encrypted field exists.
    pub fn api_key(
        &self,
        platform_id: &str,
        password: Option<&str>,
    ) -> Result<Option<String>, UserConfigError> {
        let Some(platform) = self.platforms.get(platform_id) else {
            return Ok(None);
        };

        if let (Some(password), Some(encrypted)) = (password, platform.encrypted_api_key.as_deref())
        {
            return Ok(Some(PasswordCodec::new().decrypt(encrypted, password)?));
        }

        Ok(platform.api_key.clone())
    }

    pub fn remove_platform(&mut self, platform_id: &str) -> bool {
        self.platforms.remove(platform_id).is_some()
    }
}

/// Default config path inside a state directory.
pub fn default_config_path(state_dir: &Path) -> PathBuf {
    state_dir.join("config.yaml")
}
