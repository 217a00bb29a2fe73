//! Platform endpoint and API key commands, backed by the YAML user config.

use clap::Subcommand;

use crate::config::Config;
use crate::user_config::UserConfig;

#[derive(Subcommand, Debug, Clone)]
pub enum PlatformCommand {
    /// Store the API key for a platform (encrypted when a password is given)
    SetKey {
        platform: String,

        api_key: String,

        /// Encrypt the key with this password
        #[arg(long, env = "CPA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Print the API key for a platform
    GetKey {
        platform: String,

        /// Password for an encrypted key
        #[arg(long, env = "CPA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Set or clear the base URL for a platform
    SetUrl {
        platform: String,

        /// Omit to clear
        base_url: Option<String>,
    },

    /// List configured platforms
    List,

    /// Remove a platform from the config
    Remove { platform: String },
}

/// Run a platform command. Returns the process exit code.
pub fn run_platform_command(cmd: PlatformCommand, config: &Config) -> anyhow::Result<i32> {
    let path = &config.config_file;
    let mut user_config = UserConfig::load(path)?;

    match cmd {
        PlatformCommand::SetKey {
            platform,
            api_key,
            password,
        } => {
            user_config.set_api_key(&platform, &api_key, password.as_deref())?;
            user_config.save(path)?;
            eprintln!("Saved API key for {}", platform);
        }

        PlatformCommand::GetKey { platform, password } => {
            match user_config.api_key(&platform, password.as_deref())? {
                Some(key) => println!("{}", key),
                None => {
                    eprintln!("No API key configured for {}", platform);
                    return Ok(1);
                }
            }
        }

        PlatformCommand::SetUrl { platform, base_url } => {
            user_config.set_base_url(&platform, base_url);
            user_config.save(path)?;
        }

        PlatformCommand::List => {
            for (id, platform) in &user_config.platforms {
                let key_state = if platform.encrypted_api_key.is_some() {
                    "encrypted key"
                } else if platform.api_key.is_some() {
                    "plaintext key"
                } else {
                    "no key"
                };
                println!(
                    "{:<16} {:<14} {}",
                    id,
                    key_state,
                    platform.base_url.as_deref().unwrap_or("-")
                );
            }
        }

        PlatformCommand::Remove { platform } => {
            if user_config.remove_platform(&platform) {
                user_config.save(path)?;
            } else {
                eprintln!("No platform {}", platform);
            }
        }
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_encrypted_key() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config::new(temp.path().to_path_buf());

        run_platform_command(
            PlatformCommand::SetKey {
                platform: "glm".to_string(),
                api_key: "sk-glm".to_string(),
                password: Some("pw".to_string()),
            },
            &config,
        )
        .unwrap();

        let saved = std::fs::read_to_string(&config.config_file).unwrap();
        assert!(!saved.contains("sk-glm"));

        let loaded = UserConfig::load(&config.config_file).unwrap();
        assert_eq!(loaded.api_key("glm", Some("pw")).unwrap().as_deref(), Some("sk-glm"));

        let code = run_platform_command(
            PlatformCommand::GetKey {
                platform: "kimi".to_string(),
                password: None,
            },
            &config,
        )
        .unwrap();
        assert_eq!(code, 1);
    }
}
