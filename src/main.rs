use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use magpie::cli::{commands, Cli, Commands};
use magpie::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Harvest(args) => {
            let outcome = commands::harvest(&args, config).await?;
            Ok(ExitCode::from(outcome.exit_code()))
        }
        Commands::Targets { input } => {
            commands::targets(&input)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Report { output_dir } => {
            commands::report(&output_dir)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
