//! cpa - CLI entry point
//!
//! Parses the command line, loads configuration from the environment and
//! dispatches to the credential, platform and tool commands.

use clap::Parser;
use cpa::{cli, config::Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let code = runtime.block_on(async_main(cli))?;
    std::process::exit(code);
}

async fn async_main(cli: cli::Cli) -> anyhow::Result<i32> {
    // Logs go to stderr so stdout stays clean for `eval "$(cpa credential env ...)"`
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cpa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    tracing::debug!(
        "Loaded configuration: state_dir={}",
        config.state_dir.display()
    );

    cli::run(cli, &config).await
}
