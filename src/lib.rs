//! # cpa
//!
//! Credential and endpoint manager for AI coding assistants.
//!
//! This library provides:
//! - Password-based and machine-bound encryption of secrets
//! - An encrypted per-platform, per-tool credential store that hands
//!   credentials to tools through environment variables or wrapper scripts
//! - Validation of tool command lines before they are spawned, without a shell
//!
//! ## Architecture
//!
//! ```text
//!   cli ──► user_config ──► crypto::PasswordCodec
//!    │
//!    ├──► secrets::CredentialStore ──► crypto::MachineKeyCodec
//!    │         │                        (key in ~/.cpa/.machine_key)
//!    │         ├──► env (CPA_<PLATFORM>_<TOOL>_<KEY>)
//!    │         └──► wrappers/<platform>/<tool>.sh
//!    │
//!    └──► tools::ToolInvoker ──► command::make_safe ──► direct spawn
//! ```
//!
//! ## Modules
//! - `crypto`: password and machine-key codecs
//! - `secrets`: the credential store and its storage strategies
//! - `command`: command-line lexer and validator
//! - `tools`: validated tool invocation
//! - `user_config`: YAML platform config with encrypted API keys
//! - `config`: runtime configuration from environment variables

pub mod cli;
pub mod command;
pub mod config;
pub mod crypto;
pub mod secrets;
pub mod tools;
pub mod user_config;
pub mod util;

pub use command::{make_safe, validate, SafeCommand};
pub use config::Config;
pub use crypto::{MachineKey, MachineKeyCodec, PasswordCodec};
pub use secrets::{CredentialStore, StorageType};
pub use user_config::UserConfig;
