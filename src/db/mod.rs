use crate::config::DatabaseConfig;
use anyhow::Result;
use log::info;

pub mod detections;

pub use detections::DetectionStore;

/// Build the detection store and bootstrap its schema if configured.
pub async fn init_store(config: &DatabaseConfig) -> Result<DetectionStore> {
    info!("Initializing detection store");

    let store = DetectionStore::new(&config.url);

    if config.auto_migrate {
        store.ensure_schema().await?;
        info!("Detections table ready");
    }

    Ok(store)
}
