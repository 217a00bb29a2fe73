//! Encrypted credential store.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;

use crate::crypto::{MachineKey, MachineKeyCodec};

use super::env::{apply_env_credential, env_var_name, EnvMode};
use super::types::{composite_key, CredentialEntry, CredentialIndex, StorageType};
use super::wrapper::WrapperScripts;
use super::StoreError;

/// Encrypted store file name.
pub const STORE_FILE: &str = "credentials.json.enc";

/// Legacy plaintext store, migrated and deleted on first open.
pub const LEGACY_STORE_FILE: &str = "credentials.json";

const LOCK_FILE: &str = "credentials.lock";
const WRAPPER_DIR: &str = "wrappers";

/// Filesystem locations used by a [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub store_file: PathBuf,
    pub legacy_file: PathBuf,
    pub lock_file: PathBuf,
    pub wrapper_dir: PathBuf,
}

impl StorePaths {
    /// Standard layout inside a state directory.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            store_file: state_dir.join(STORE_FILE),
            legacy_file: state_dir.join(LEGACY_STORE_FILE),
            lock_file: state_dir.join(LOCK_FILE),
            wrapper_dir: state_dir.join(WRAPPER_DIR),
        }
    }
}

/// Behaviour switches for a [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub env_mode: EnvMode,
    /// Program wrapper scripts call to fetch credentials.
    pub cli_program: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            env_mode: EnvMode::Process,
            cli_program: "cpa".to_string(),
        }
    }
}

/// What `set_credential` did beyond updating the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEffect {
    /// Variable exported into this process.
    Exported { name: String },
    /// Deferred env mode: the caller decides where the pair goes.
    Deferred { name: String, value: String },
    /// Wrapper script (re)generated.
    WrapperWritten { path: PathBuf },
    /// Keychain type: stored in the encrypted index only.
    IndexOnly,
}

/// Persistent index of per-platform, per-tool credentials.
///
/// Every mutation holds an advisory lock while it re-reads the store from
/// disk, applies the change and rewrites the whole store (encrypted under the
/// machine key) through a temp file and rename. The in-memory index is only
/// replaced once the write succeeds.
#[derive(Debug)]
pub struct CredentialStore {
    index: CredentialIndex,
    paths: StorePaths,
    codec: MachineKeyCodec,
    wrappers: WrapperScripts,
    env_mode: EnvMode,
}

impl CredentialStore {
    /// Open the store, migrating a legacy plaintext store if one is found.
    pub fn open(
        paths: StorePaths,
        key: MachineKey,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let wrappers = WrapperScripts::new(&paths.wrapper_dir, options.cli_program);
        let mut store = Self {
            index: CredentialIndex::default(),
            paths,
            codec: MachineKeyCodec::new(key),
            wrappers,
            env_mode: options.env_mode,
        };

        let lock = store.lock()?;
        store.index = store.load_or_migrate()?;
        drop(lock);

        tracing::debug!(
            "Opened credential store {} ({} credentials)",
            store.paths.store_file.display(),
            store.index.credentials.len()
        );
        Ok(store)
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn version(&self) -> &str {
        &self.index.version
    }

    pub fn env_mode(&self) -> EnvMode {
        self.env_mode
    }

    fn lock(&self) -> Result<fs::File, StoreError> {
        let path = &self.paths.lock_file;
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err)?;
        file.lock_exclusive().map_err(io_err)?;
        // Released when the file handle is dropped.
        Ok(file)
    }

    fn load_or_migrate(&self) -> Result<CredentialIndex, StoreError> {
        let store_file = &self.paths.store_file;
        if store_file.exists() {
            let encrypted = fs::read_to_string(store_file).map_err(|source| StoreError::Io {
                path: store_file.display().to_string(),
                source,
            })?;
            let json = self.codec.decrypt(&encrypted)?;
            return Ok(serde_json::from_str(&json)?);
        }

        let legacy_file = &self.paths.legacy_file;
        if legacy_file.exists() {
            let json = fs::read_to_string(legacy_file).map_err(|source| StoreError::Io {
                path: legacy_file.display().to_string(),
                source,
            })?;
            let index: CredentialIndex = serde_json::from_str(&json)?;
            self.write_index(&index)?;
            tracing::info!(
                "Migrated {} credentials from {} to encrypted store",
                index.credentials.len(),
                legacy_file.display()
            );

            if let Err(e) = fs::remove_file(legacy_file) {
                tracing::warn!(
                    "Migrated credentials but could not delete {}: {}",
                    legacy_file.display(),
                    e
                );
            }
            return Ok(index);
        }

        Ok(CredentialIndex::default())
    }

    fn write_index(&self, index: &CredentialIndex) -> Result<(), StoreError> {
        let json = serde_json::to_string(index)?;
        let encrypted = self.codec.encrypt(&json)?;
        crate::util::write_atomic(&self.paths.store_file, encrypted.as_bytes(), true).map_err(
            |source| StoreError::Io {
                path: self.paths.store_file.display().to_string(),
                source,
            },
        )
    }

    /// Reload the index from disk, apply `mutate`, persist, and adopt the result.
    ///
    /// The lock is held from the reload until the write completes, so changes
    /// made by other processes since `open` are kept. If anything fails the
    /// in-memory index is left as it was.
    fn commit<R>(
        &mut self,
        mutate: impl FnOnce(&mut CredentialIndex) -> R,
    ) -> Result<R, StoreError> {
        let lock = self.lock()?;
        let result = self.load_or_migrate().and_then(|mut fresh| {
            let outcome = mutate(&mut fresh);
            self.write_index(&fresh)?;
            Ok((fresh, outcome))
        });
        drop(lock);

        match result {
            Ok((fresh, outcome)) => {
                self.index = fresh;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Failed to persist credential store: {}", e);
                Err(e)
            }
        }
    }

    /// Insert or update a credential and apply its storage side effect.
    ///
    /// `created_at` survives updates. The index is persisted before the side
    /// effect runs, so a failing side effect leaves the credential stored.
    pub fn set_credential(
        &mut self,
        platform_id: &str,
        tool_id: &str,
        key: &str,
        value: &str,
        storage_type: StorageType,
    ) -> Result<StorageEffect, StoreError> {
        for id in [platform_id, tool_id, key] {
            check_identifier(id)?;
        }
        if storage_type == StorageType::Wrapper {
            self.wrappers.check_identifiers(platform_id, tool_id)?;
        }
        if value.contains('\0') {
            return Err(StoreError::InvalidValue(
                composite_key(platform_id, tool_id, key),
                "credential values cannot contain NUL",
            ));
        }

        let id = composite_key(platform_id, tool_id, key);
        let now = Utc::now();
        let entry_id = id.clone();
        self.commit(|index| {
            let created_at = index
                .credentials
                .get(&entry_id)
                .map(|existing| existing.created_at)
                .unwrap_or(now);
            index.credentials.insert(
                entry_id,
                CredentialEntry {
                    platform_id: platform_id.to_string(),
                    tool_id: tool_id.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                    storage_type,
                    created_at,
                    updated_at: now,
                },
            );
        })?;
        tracing::info!("Stored credential {} ({})", id, storage_type);

        match storage_type {
            StorageType::Env => {
                let name = env_var_name(platform_id, tool_id, key);
                match self.env_mode {
                    EnvMode::Process => {
                        apply_env_credential(&name, value)?;
                        Ok(StorageEffect::Exported { name })
                    }
                    EnvMode::Deferred => Ok(StorageEffect::Deferred {
                        name,
                        value: value.to_string(),
                    }),
                }
            }
            StorageType::Wrapper => {
                let path = self.wrappers.write(platform_id, tool_id)?;
                Ok(StorageEffect::WrapperWritten { path })
            }
            StorageType::Keychain => {
                tracing::warn!(
                    "Credential {} uses keychain storage, which is not backed by an OS keychain; \
                     it is kept in the encrypted store only",
                    id
                );
                Ok(StorageEffect::IndexOnly)
            }
        }
    }

    pub fn get_entry(&self, platform_id: &str, tool_id: &str, key: &str) -> Option<&CredentialEntry> {
        self.index
            .credentials
            .get(&composite_key(platform_id, tool_id, key))
    }

    pub fn get_credential(&self, platform_id: &str, tool_id: &str, key: &str) -> Option<&str> {
        self.get_entry(platform_id, tool_id, key)
            .map(|entry| entry.value.as_str())
    }

    pub fn has_credential(&self, platform_id: &str, tool_id: &str, key: &str) -> bool {
        self.get_entry(platform_id, tool_id, key).is_some()
    }

    pub fn get_storage_type(
        &self,
        platform_id: &str,
        tool_id: &str,
        key: &str,
    ) -> Option<StorageType> {
        self.get_entry(platform_id, tool_id, key)
            .map(|entry| entry.storage_type)
    }

    /// Remove a credential. Removing a missing credential succeeds.
    ///
    /// Wrapper scripts for the pair are deleted first (best-effort) unless
    /// another wrapper credential still uses them. A variable already
    /// exported into this process is not unset.
    pub fn remove_credential(
        &mut self,
        platform_id: &str,
        tool_id: &str,
        key: &str,
    ) -> Result<(), StoreError> {
        let id = composite_key(platform_id, tool_id, key);
        let wrappers = self.wrappers.clone();
        let removed = self.commit(|index| {
            let Some(entry) = index.credentials.remove(&id) else {
                return false;
            };
            if entry.storage_type == StorageType::Wrapper {
                let still_used = index.credentials.values().any(|other| {
                    other.storage_type == StorageType::Wrapper
                        && other.platform_id == platform_id
                        && other.tool_id == tool_id
                });
                if !still_used {
                    if let Err(e) = wrappers.remove(platform_id, tool_id) {
                        tracing::warn!(
                            "Failed to remove wrapper script for {}:{}: {}",
                            platform_id,
                            tool_id,
                            e
                        );
                    }
                }
            }
            true
        })?;

        if !removed {
            tracing::debug!("Credential {} not present, nothing to remove", id);
            return Ok(());
        }
        tracing::info!("Removed credential {}", id);
        Ok(())
    }

    /// Every credential, ordered by composite key.
    pub fn entries(&self) -> impl Iterator<Item = &CredentialEntry> {
        self.index.credentials.values()
    }

    pub fn credentials_for_tool(&self, tool_id: &str) -> Vec<&CredentialEntry> {
        self.entries().filter(|e| e.tool_id == tool_id).collect()
    }

    pub fn credentials_for_platform(&self, platform_id: &str) -> Vec<&CredentialEntry> {
        self.entries().filter(|e| e.platform_id == platform_id).collect()
    }

    /// Write every credential as `NAME=value` lines. Returns the count.
    ///
    /// The file holds plaintext secrets; it is created owner-only on Unix and
    /// callers must treat it as sensitive.
    pub fn export_to_env_file(&self, path: &Path) -> Result<usize, StoreError> {
        let mut contents = String::new();
        for entry in self.entries() {
            contents.push_str(&format!("{}={}\n", entry.env_var_name(), entry.value));
        }
        crate::util::write_atomic(path, contents.as_bytes(), true).map_err(|source| {
            StoreError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
        tracing::info!(
            "Exported {} credentials to {}",
            self.index.credentials.len(),
            path.display()
        );
        Ok(self.index.credentials.len())
    }

    /// Name/value pairs for every `env` credential, without touching the environment.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.entries()
            .filter(|e| e.storage_type == StorageType::Env)
            .map(|e| (e.env_var_name(), e.value.clone()))
            .collect()
    }

    /// Pairs a wrapper for `(platform_id, tool_id)` should see: its `env` and
    /// `wrapper` credentials. Keychain entries are never included.
    pub fn wrapper_env_pairs(&self, platform_id: &str, tool_id: &str) -> Vec<(String, String)> {
        self.entries()
            .filter(|e| e.platform_id == platform_id && e.tool_id == tool_id)
            .filter(|e| matches!(e.storage_type, StorageType::Env | StorageType::Wrapper))
            .map(|e| (e.env_var_name(), e.value.clone()))
            .collect()
    }

    /// Export every `env` credential into this process. Returns how many
    /// were applied; entries that cannot be represented are skipped with a warning.
    pub fn load_credentials_to_environment(&self) -> usize {
        let mut applied = 0;
        for (name, value) in self.env_pairs() {
            match apply_env_credential(&name, &value) {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!("Skipping {}: {}", name, e),
            }
        }
        tracing::debug!("Loaded {} credentials into the environment", applied);
        applied
    }
}

fn check_identifier(id: &str) -> Result<(), StoreError> {
    if id.trim().is_empty() {
        return Err(StoreError::InvalidIdentifier(
            id.to_string(),
            "identifiers cannot be empty",
        ));
    }
    if id.contains(':') || id.contains('=') || id.contains('\0') {
        return Err(StoreError::InvalidIdentifier(
            id.to_string(),
            "identifiers cannot contain ':', '=' or NUL",
        ));
    }
    Ok(())
}
