use anyhow::Result;
use log::info;
use parkwatch::api::RestApi;
use parkwatch::config;
use parkwatch::db;
use std::path::PathBuf;

async fn run_app() -> Result<()> {
    // Initialize logging
    env_logger::init();
    info!("Starting parkwatch monitoring server");

    // Load configuration, optionally from a file given as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;
    info!("Configuration loaded");

    // Bring up the detection store (and its schema, if configured)
    let store = db::init_store(&config.database).await?;

    // Start the REST API
    let http_server = RestApi::new(&config.api, &config.lot, store)?;

    tokio::select! {
        result = http_server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
