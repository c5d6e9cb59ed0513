//! Telemsim - telemetry simulator server
//!
//! Entry point: loads settings, opens the store, and serves the HTTP API.

use anyhow::Result;
use clap::Parser;
use telemsim::cli::Cli;
use telemsim::server::{AppState, EngineHandle};
use telemsim::settings::Settings;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telemsim=info".parse()?)
                .add_directive("telemsim_core=info".parse()?)
                .add_directive("telemsim_server=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let settings_path = cli.settings_path();
    let mut settings = Settings::load(&settings_path);
    settings.apply_cli(&cli);

    if cli.save_settings {
        settings.save(&settings_path)?;
        println!("Settings written to {}", settings_path.display());
        return Ok(());
    }

    info!(
        version = telemsim::VERSION,
        build_date = telemsim::BUILD_DATE,
        "Starting telemsim"
    );

    // A store that cannot be opened is fatal
    let simulator = match telemsim::build_simulator(&settings) {
        Ok(simulator) => simulator,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(EngineHandle::spawn(simulator), settings.server_config());

    if let Err(e) = telemsim::server::start_server(state).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Telemsim stopped");
    Ok(())
}
