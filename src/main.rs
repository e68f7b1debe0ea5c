//! tabserve - Main Entry Point
//!
//! Fit, score and serve a validated tabular classification pipeline.

use clap::Parser;
use tabserve::cli::{cmd_info, cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabserve=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { config, data, version } => {
            cmd_train(&config, &data, version.as_deref())?;
        }
        Commands::Predict { config, input, version, output } => {
            cmd_predict(&config, &input, version.as_deref(), output.as_deref())?;
        }
        Commands::Serve { config, host, port } => {
            cmd_serve(&config, host, port).await?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
