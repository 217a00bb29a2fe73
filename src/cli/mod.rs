//! CLI command handling.
//!
//! Provides subcommands for:
//! - Managing stored credentials (`credential set`, `credential env`, ...)
//! - Managing platform endpoints and API keys (`platform set-key`, ...)
//! - Password encryption of arbitrary text (`encrypt`, `decrypt`)
//! - Checking and running tool commands (`check-command`, `run`)

mod credential;
mod platform;

pub use credential::{open_store, run_credential_command, CredentialCommand, ShellArg};
pub use platform::{run_platform_command, PlatformCommand};

use clap::{Parser, Subcommand};

use crate::command::{validate, SafeCommand};
use crate::config::Config;
use crate::crypto::PasswordCodec;
use crate::tools::{InvokeError, ToolInvoker};

#[derive(Parser, Debug)]
#[command(name = "cpa")]
#[command(about = "Credential and endpoint manager for AI coding assistants")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage stored credentials
    #[command(subcommand)]
    Credential(CredentialCommand),

    /// Manage platform endpoints and API keys
    #[command(subcommand)]
    Platform(PlatformCommand),

    /// Encrypt text with a password (base64 output)
    Encrypt {
        plaintext: String,

        #[arg(long, env = "CPA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Decrypt text produced by `encrypt`
    Decrypt {
        ciphertext: String,

        #[arg(long, env = "CPA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Validate a command line and print the result as JSON
    CheckCommand {
        /// The full command line, quoted as one argument
        command_line: String,
    },

    /// Validate and run a tool with stored credentials in its environment
    Run {
        /// Only pass credentials for this platform/tool pair (requires --tool)
        #[arg(long, requires = "tool")]
        platform: Option<String>,

        #[arg(long, requires = "platform")]
        tool: Option<String>,

        /// Program and arguments
        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },
}

/// Dispatch a parsed command line. Returns the process exit code.
pub async fn run(cli: Cli, config: &Config) -> anyhow::Result<i32> {
    match cli.command {
        Command::Credential(cmd) => run_credential_command(cmd, config),
        Command::Platform(cmd) => run_platform_command(cmd, config),

        Command::Encrypt {
            plaintext,
            password,
        } => {
            println!("{}", PasswordCodec::new().encrypt(&plaintext, &password)?);
            Ok(0)
        }

        Command::Decrypt {
            ciphertext,
            password,
        } => {
            println!("{}", PasswordCodec::new().decrypt(&ciphertext, &password)?);
            Ok(0)
        }

        Command::CheckCommand { command_line } => {
            let result = validate(&command_line);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(if result.is_valid { 0 } else { 1 })
        }

        Command::Run {
            platform,
            tool,
            command,
        } => run_tool(config, platform, tool, command).await,
    }
}

async fn run_tool(
    config: &Config,
    platform: Option<String>,
    tool: Option<String>,
    command: Vec<String>,
) -> anyhow::Result<i32> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("No command given");
    };
    let safe = SafeCommand::from_parts(program, args).map_err(InvokeError::Rejected)?;

    let store = open_store(config)?;
    let envs = match (platform.as_deref(), tool.as_deref()) {
        (Some(platform), Some(tool)) => store.wrapper_env_pairs(platform, tool),
        _ => store.env_pairs(),
    };
    drop(store);

    let output = ToolInvoker::new(config.command_timeout)
        .run_safe(&safe, &envs)
        .await?;
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    Ok(output.exit_code)
}
