//! Secure credential store.
//!
//! Keeps the authoritative index of per-platform, per-tool secrets and makes
//! each one available to its tool through a storage strategy.
//!
//! ## Layout
//!
//! ```text
//! ~/.cpa/
//! ├── .machine_key              # Raw 32-byte machine key (0600)
//! ├── credentials.json.enc      # Encrypted index: hex(iv):hex(tag):hex(ciphertext)
//! ├── credentials.json          # Legacy plaintext index (migrated, then deleted)
//! ├── credentials.lock          # Advisory lock for load/save
//! └── wrappers/
//!     └── <platform>/<tool>.sh  # Wrapper scripts (no secrets inside)
//! ```
//!
//! ## Storage strategies
//!
//! - `env`: exported as `CPA_<PLATFORM>_<TOOL>_<KEY>` into this process, or
//!   handed back to the caller in [`EnvMode::Deferred`].
//! - `wrapper`: a script that asks the CLI for the pair's credentials each
//!   time it runs, then executes the tool.
//! - `keychain`: stored in the encrypted index only. There is no OS keychain
//!   integration; selecting it is reported as [`StorageEffect::IndexOnly`].
//!
//! ## Usage
//!
//! ```ignore
//! let key = MachineKey::load_or_create(&config.machine_key_file())?;
//! let mut store = CredentialStore::open(
//!     StorePaths::in_dir(&config.state_dir),
//!     key,
//!     StoreOptions::default(),
//! )?;
//!
//! store.set_credential("glm", "cursor", "api_key", "sk-...", StorageType::Env)?;
//! assert_eq!(std::env::var("CPA_GLM_CURSOR_API_KEY")?, "sk-...");
//! ```

mod env;
mod store;
pub mod types;
mod wrapper;

use thiserror::Error;

use crate::crypto::CryptoError;

pub use env::{
    apply_env_credential, env_var_name, format_assignments, EnvMode, ShellFlavor, ENV_PREFIX,
};
pub use store::{
    CredentialStore, StorageEffect, StoreOptions, StorePaths, LEGACY_STORE_FILE, STORE_FILE,
};
pub use types::*;
pub use wrapper::WrapperScripts;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential store is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Credential store could not be decrypted: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid identifier {0:?}: {1}")]
    InvalidIdentifier(String, &'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, &'static str),
}
