use crate::api::DEGRADED_HEADER;
use crate::error::Error;
use crate::parking::session::ParkingRow;
use crate::parking::stats::DashboardStats;
use crate::watch::DashboardSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Source of dashboard snapshots.
///
/// The REST client below is the production implementation; tests script
/// their own to drive the controller without a server.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<DashboardSnapshot>;
}

/// HTTP client for the parkwatch API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<(T, bool)> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(
                Error::Transport(format!("GET {} returned {}", url, response.status())).into(),
            );
        }

        let degraded = response
            .headers()
            .get(DEGRADED_HEADER)
            .map(|v| v == "1")
            .unwrap_or(false);

        let body = response
            .json::<T>()
            .await
            .map_err(|e| Error::Transport(format!("Failed to decode {}: {}", url, e)))?;

        Ok((body, degraded))
    }
}

#[async_trait]
impl SnapshotSource for ApiClient {
    async fn fetch(&self) -> Result<DashboardSnapshot> {
        let (rows, rows_degraded) = self.get_json::<Vec<ParkingRow>>("/api/parking").await?;
        let (stats, stats_degraded) = self.get_json::<DashboardStats>("/api/stats").await?;

        Ok(DashboardSnapshot {
            rows,
            stats,
            degraded: rows_degraded || stats_degraded,
        })
    }
}
