use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subscout_core::config::LoggingConfig;
use subscout_core::{
    load_config, validate_config, BazarrClient, Ledger, Runner, SanitizedConfig, SubSourceClient,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},reqwest=warn,hyper=warn", logging.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(logging.json.then(|| fmt::layer().json()))
        .with((!logging.json).then(fmt::layer))
        .init();
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("SUBSCOUT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration, then start logging with its settings
    let config = match load_config(&config_path) {
        Ok(config) => {
            init_logging(&config.logging);
            config
        }
        Err(e) => {
            init_logging(&LoggingConfig::default());
            return Err(e).with_context(|| format!("Failed to load config from {:?}", config_path));
        }
    };

    info!(version = VERSION, "Starting subscout");
    info!("Loaded configuration from {:?}", config_path);
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    info!(
        "Configuration: {}",
        serde_json::to_string(&sanitized).unwrap_or_default()
    );

    let service = Arc::new(
        BazarrClient::new(&config.media_service).context("Failed to create media service client")?,
    );
    let catalog =
        Arc::new(SubSourceClient::new(&config.catalog).context("Failed to create catalog client")?);
    let ledger = Ledger::open(&config.ledger.path)
        .with_context(|| format!("Failed to open ledger at {:?}", config.ledger.path))?;
    info!(path = %ledger.path().display(), subjects = ledger.len(), "Ledger loaded");

    let mut runner = Runner::new(service, catalog, ledger, &config);
    let summary = runner.run().await?;

    info!(
        "Summary: {}",
        serde_json::to_string(&summary).unwrap_or_default()
    );
    Ok(())
}
