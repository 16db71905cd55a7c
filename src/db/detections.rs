use crate::error::Error;
use anyhow::Result;
use log::warn;
use serde_json::Value;
use sqlx::{Connection, PgConnection, Row};

/// Access to the `detections` document table.
///
/// Holds only the connection string: every operation opens one short-lived
/// connection, runs its query and closes the connection before the result
/// is inspected, so error paths release it too. The log is read-only and
/// low-QPS; a pool would buy nothing here.
#[derive(Clone)]
pub struct DetectionStore {
    url: String,
}

impl DetectionStore {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        PgConnection::connect(&self.url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to store: {}", e)).into())
    }

    async fn close(conn: PgConnection) {
        if let Err(e) = conn.close().await {
            warn!("Failed to close store connection: {}", e);
        }
    }

    /// Create the detections table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        let result = sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS detections (
                id BIGSERIAL PRIMARY KEY,
                doc JSONB NOT NULL,
                received_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&mut conn)
        .await;
        Self::close(conn).await;

        result.map_err(|e| Error::Database(format!("Failed to create detections table: {}", e)))?;
        Ok(())
    }

    /// Fetch every raw detection document, oldest first.
    pub async fn fetch_all(&self) -> Result<Vec<Value>> {
        let mut conn = self.connect().await?;
        let result = sqlx::query("SELECT doc FROM detections ORDER BY id")
            .fetch_all(&mut conn)
            .await;
        Self::close(conn).await;

        let rows =
            result.map_err(|e| Error::Database(format!("Failed to fetch detections: {}", e)))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let doc: Value = row
                .try_get("doc")
                .map_err(|e| Error::Database(format!("Failed to decode detection: {}", e)))?;
            docs.push(doc);
        }
        Ok(docs)
    }

    /// Count documents whose exit marker is absent (missing key or JSON
    /// null), i.e. vehicles still in the lot.
    pub async fn count_active(&self) -> Result<i64> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM detections
            WHERE doc->'exit_time' IS NULL OR doc->'exit_time' = 'null'::jsonb
            "#,
        )
        .fetch_one(&mut conn)
        .await;
        Self::close(conn).await;

        let count = result
            .map_err(|e| Error::Database(format!("Failed to count active detections: {}", e)))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> Option<DetectionStore> {
        match std::env::var("PARKWATCH_TEST_DATABASE_URL") {
            Ok(url) => Some(DetectionStore::new(&url)),
            Err(_) => {
                println!("Skipping store test. Set PARKWATCH_TEST_DATABASE_URL to run.");
                None
            }
        }
    }

    async fn reset(store: &DetectionStore, docs: &[Value]) -> Result<()> {
        let mut conn = store.connect().await?;
        sqlx::query("TRUNCATE detections").execute(&mut conn).await?;
        for doc in docs {
            sqlx::query("INSERT INTO detections (doc) VALUES ($1)")
                .bind(doc)
                .execute(&mut conn)
                .await?;
        }
        DetectionStore::close(conn).await;
        Ok(())
    }

    #[tokio::test]
    async fn fetch_all_and_count_active_agree_on_exit_markers() -> Result<()> {
        let store = match test_store().await {
            Some(store) => store,
            None => return Ok(()),
        };
        store.ensure_schema().await?;

        reset(
            &store,
            &[
                json!({"license_plate_number": "A", "entry_time": "2024-04-02T09:00:00Z", "exit_time": null}),
                json!({"license_plate_number": "B", "entry_time": "2024-04-02T09:10:00Z"}),
                json!({"license_plate_number": "C", "entry_time": "2024-04-02T08:00:00Z", "exit_time": "2024-04-02T09:30:00Z", "parking_fee": 30}),
            ],
        )
        .await?;

        let docs = store.fetch_all().await?;
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["license_plate_number"], "A");

        // Explicit null and missing key both count as active
        assert_eq!(store.count_active().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn connect_failure_surfaces_database_error() {
        let store = DetectionStore::new("postgres://nobody@127.0.0.1:1/none");
        let err = store.fetch_all().await.unwrap_err();
        assert!(err.to_string().contains("Database error"));
    }
}
