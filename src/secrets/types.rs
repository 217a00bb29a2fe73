//! Types for the credential store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk schema version of the credential index.
pub const STORE_VERSION: &str = "1.0.0";

/// How a credential is made available to the tool that consumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Exported into the process environment as `CPA_<PLATFORM>_<TOOL>_<KEY>`.
    #[default]
    Env,
    /// Provided through a generated wrapper script that reads the store at run time.
    Wrapper,
    /// Recorded in the encrypted index only. No OS keychain is involved.
    Keychain,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::Wrapper => "wrapper",
            Self::Keychain => "keychain",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "wrapper" => Ok(Self::Wrapper),
            "keychain" => Ok(Self::Keychain),
            other => Err(format!(
                "unknown storage type '{}' (expected env, wrapper or keychain)",
                other
            )),
        }
    }
}

/// Build the `platform:tool:key` identity of a credential.
pub fn composite_key(platform_id: &str, tool_id: &str, key: &str) -> String {
    format!("{}:{}:{}", platform_id, tool_id, key)
}

/// A single stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEntry {
    pub platform_id: String,
    pub tool_id: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CredentialEntry {
    pub fn composite_key(&self) -> String {
        composite_key(&self.platform_id, &self.tool_id, &self.key)
    }

    pub fn env_var_name(&self) -> String {
        super::env::env_var_name(&self.platform_id, &self.tool_id, &self.key)
    }
}

/// The whole persisted store: a version tag plus every credential by composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialIndex {
    pub version: String,
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialEntry>,
}

impl Default for CredentialIndex {
    fn default() -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            credentials: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_parses_and_displays() {
        assert_eq!("ENV".parse::<StorageType>().unwrap(), StorageType::Env);
        assert_eq!(
            " wrapper ".parse::<StorageType>().unwrap(),
            StorageType::Wrapper
        );
        assert!("vault".parse::<StorageType>().is_err());
        assert_eq!(StorageType::Keychain.to_string(), "keychain");
    }

    #[test]
    fn test_legacy_json_layout_deserializes() {
        let json = r#"{
            "version": "1.0.0",
            "credentials": {
                "glm:cursor:api_key": {
                    "platformId": "glm",
                    "toolId": "cursor",
                    "key": "api_key",
                    "value": "sk-1",
                    "storageType": "env",
                    "createdAt": "2024-05-01T10:00:00.000Z",
                    "updatedAt": "2024-05-02T10:00:00.000Z"
                }
            }
        }"#;
        let index: CredentialIndex = serde_json::from_str(json).unwrap();
        let entry = &index.credentials["glm:cursor:api_key"];
        assert_eq!(entry.composite_key(), "glm:cursor:api_key");
        assert_eq!(entry.storage_type, StorageType::Env);
        assert!(entry.created_at < entry.updated_at);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = CredentialEntry {
            platform_id: "glm".into(),
            tool_id: "claude-code".into(),
            key: "api_key".into(),
            value: "v".into(),
            storage_type: StorageType::Wrapper,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["platformId"], "glm");
        assert_eq!(json["storageType"], "wrapper");
    }
}
