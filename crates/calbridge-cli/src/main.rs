//! calbridge CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use calbridge_cli::cli::{Cli, Command};
use calbridge_cli::commands;
use calbridge_cli::error::ClientResult;
use calbridge_core::tracing::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Command::Serve) {
        TracingConfig::server()
    } else {
        TracingConfig::default().with_level(Level::WARN)
    };

    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: failed to initialize tracing: {}", e);
    }

    // Run the command
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<ExitCode> {
    match &cli.command {
        Command::Serve => {
            commands::serve::run(&cli).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Auth {
            client_id,
            client_secret,
        } => {
            commands::auth::run(client_id.clone(), client_secret.clone()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { tool, arguments } => {
            let ok = commands::call::run(&cli, tool.clone(), arguments.clone()).await?;
            Ok(if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
