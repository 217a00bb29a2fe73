//! Credential store commands.

use std::io::BufRead;
use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::config::Config;
use crate::crypto::MachineKey;
use crate::secrets::{
    format_assignments, CredentialStore, ShellFlavor, StorageEffect, StorageType,
};

#[derive(Subcommand, Debug, Clone)]
pub enum CredentialCommand {
    /// Store a credential (the value is read from stdin unless --value is given)
    Set {
        #[arg(long)]
        platform: String,

        #[arg(long)]
        tool: String,

        /// Credential name, e.g. "api_key"
        #[arg(long)]
        key: String,

        /// Secret value. Prefer stdin: command-line arguments are visible to other users
        #[arg(long)]
        value: Option<String>,

        /// How the credential reaches the tool: env, wrapper or keychain
        #[arg(long, default_value = "env", value_parser = parse_storage_type)]
        storage: StorageType,
    },

    /// Print a credential value
    Get {
        #[arg(long)]
        platform: String,

        #[arg(long)]
        tool: String,

        #[arg(long)]
        key: String,
    },

    /// Remove a credential (no error if absent)
    Remove {
        #[arg(long)]
        platform: String,

        #[arg(long)]
        tool: String,

        #[arg(long)]
        key: String,
    },

    /// List stored credentials without their values
    List {
        /// Only credentials for this platform
        #[arg(long)]
        platform: Option<String>,

        /// Only credentials for this tool
        #[arg(long)]
        tool: Option<String>,
    },

    /// Write every credential to an env file as NAME=value lines
    Export {
        /// Output path
        path: PathBuf,
    },

    /// Print shell assignments for one platform/tool pair (used by wrapper scripts)
    Env {
        #[arg(long)]
        platform: String,

        #[arg(long)]
        tool: String,

        #[arg(long, value_enum, default_value_t = ShellArg::Sh)]
        shell: ShellArg,
    },

    /// Print shell assignments for every env credential, for `eval "$(cpa credential load)"`
    Load {
        #[arg(long, value_enum, default_value_t = ShellArg::Sh)]
        shell: ShellArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellArg {
    Sh,
    Cmd,
}

impl From<ShellArg> for ShellFlavor {
    fn from(shell: ShellArg) -> Self {
        match shell {
            ShellArg::Sh => ShellFlavor::Posix,
            ShellArg::Cmd => ShellFlavor::Cmd,
        }
    }
}

fn parse_storage_type(s: &str) -> Result<StorageType, String> {
    s.parse()
}

/// Open the credential store described by `config`.
pub fn open_store(config: &Config) -> anyhow::Result<CredentialStore> {
    let key = MachineKey::load_or_create(&config.machine_key_file())?;
    Ok(CredentialStore::open(
        config.store_paths(),
        key,
        config.store_options(),
    )?)
}

/// Run a credential command. Returns the process exit code.
pub fn run_credential_command(cmd: CredentialCommand, config: &Config) -> anyhow::Result<i32> {
    let mut store = open_store(config)?;

    match cmd {
        CredentialCommand::Set {
            platform,
            tool,
            key,
            value,
            storage,
        } => {
            let value = match value {
                Some(value) => value,
                None => read_secret_from_stdin()?,
            };
            let effect = store.set_credential(&platform, &tool, &key, &value, storage)?;
            describe_effect(&effect);
        }

        CredentialCommand::Get {
            platform,
            tool,
            key,
        } => match store.get_credential(&platform, &tool, &key) {
            Some(value) => println!("{}", value),
            None => {
                eprintln!("No credential {}:{}:{}", platform, tool, key);
                return Ok(1);
            }
        },

        CredentialCommand::Remove {
            platform,
            tool,
            key,
        } => {
            store.remove_credential(&platform, &tool, &key)?;
            eprintln!("Removed {}:{}:{}", platform, tool, key);
        }

        CredentialCommand::List { platform, tool } => {
            let entries: Vec<_> = store
                .entries()
                .filter(|e| platform.as_deref().map_or(true, |p| e.platform_id == p))
                .filter(|e| tool.as_deref().map_or(true, |t| e.tool_id == t))
                .collect();
            if entries.is_empty() {
                eprintln!("No credentials stored.");
            }
            for entry in entries {
                println!(
                    "{:<32} {:<8} {:<40} updated {}",
                    entry.composite_key(),
                    entry.storage_type,
                    entry.env_var_name(),
                    entry.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        CredentialCommand::Export { path } => {
            let count = store.export_to_env_file(&path)?;
            eprintln!(
                "Exported {} credential(s) to {}. The file contains plaintext secrets.",
                count,
                path.display()
            );
        }

        CredentialCommand::Env {
            platform,
            tool,
            shell,
        } => {
            let pairs = store.wrapper_env_pairs(&platform, &tool);
            print!("{}", format_assignments(&pairs, shell.into()));
        }

        CredentialCommand::Load { shell } => {
            print!("{}", format_assignments(&store.env_pairs(), shell.into()));
        }
    }

    Ok(0)
}

fn read_secret_from_stdin() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        anyhow::bail!("No credential value given on stdin");
    }
    Ok(value)
}

fn describe_effect(effect: &StorageEffect) {
    match effect {
        StorageEffect::Exported { name } | StorageEffect::Deferred { name, .. } => {
            eprintln!(
                "Stored as {}. Load it into your shell with: eval \"$(cpa credential load)\"",
                name
            );
        }
        StorageEffect::WrapperWritten { path } => {
            eprintln!("Stored. Wrapper script written to {}", path.display());
        }
        StorageEffect::IndexOnly => {
            eprintln!("Stored in the encrypted index only (no OS keychain integration).");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_parses_case_insensitively() {
        assert_eq!(parse_storage_type("Wrapper").unwrap(), StorageType::Wrapper);
        assert!(parse_storage_type("vault").is_err());
    }

    #[test]
    fn test_commands_roundtrip_through_store() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::new(temp.path().to_path_buf());
        config.apply_env = false;

        let code = run_credential_command(
            CredentialCommand::Set {
                platform: "glm".to_string(),
                tool: "cursor".to_string(),
                key: "api_key".to_string(),
                value: Some("sk-cli".to_string()),
                storage: StorageType::Env,
            },
            &config,
        )
        .unwrap();
        assert_eq!(code, 0);

        let store = open_store(&config).unwrap();
        assert_eq!(store.get_credential("glm", "cursor", "api_key"), Some("sk-cli"));
        drop(store);

        let code = run_credential_command(
            CredentialCommand::Get {
                platform: "glm".to_string(),
                tool: "cursor".to_string(),
                key: "missing".to_string(),
            },
            &config,
        )
        .unwrap();
        assert_eq!(code, 1);

        run_credential_command(
            CredentialCommand::Remove {
                platform: "glm".to_string(),
                tool: "cursor".to_string(),
                key: "api_key".to_string(),
            },
            &config,
        )
        .unwrap();
        assert!(!open_store(&config)
            .unwrap()
            .has_credential("glm", "cursor", "api_key"));
    }
}
