use anyhow::Result;
use clap::Parser;

use logtail_daemon::cli::DaemonCli;
use logtail_daemon::logging;
use logtail_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = orchestrator::load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logtail starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    let result = orchestrator.run().await;

    match &result {
        Ok(()) => tracing::info!("logtail shut down"),
        Err(e) => tracing::error!(error = %e, "logtail exiting after fatal error"),
    }
    result
}
