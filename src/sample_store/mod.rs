// Durable key/value state: the previous raw sample and the open accumulator window.
// SQLite table `sampler_state` holds one wincode blob per key.

mod blob;
mod memory;

pub use memory::MemorySampleStore;

use crate::models::{RawSample, WindowState};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// Key of the previously captured sample.
pub const LAST_SAMPLE_KEY: &str = "last-cpu-usage-sample";
/// Key of the CPU usage accumulator window.
pub const ACCUMULATOR_KEY: &str = "cpu-usage-accumulator";

/// Where the orchestrator remembers state between ticks and across restarts.
pub trait SampleStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<RawSample>>> + Send;

    fn set(
        &self,
        key: &str,
        sample: &RawSample,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn get_window(
        &self,
        key: &str,
    ) -> impl Future<Output = anyhow::Result<Option<WindowState>>> + Send;

    fn set_window(
        &self,
        key: &str,
        state: &WindowState,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Decoded row of `sampler_state`, for inspection tools.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntry {
    pub key: String,
    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
    pub value: StoredValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum StoredValue {
    Sample(RawSample),
    Window(WindowState),
    Unreadable { blob_kind: u8, len: usize },
}

pub struct SqliteSampleStore {
    pool: SqlitePool,
}

impl SqliteSampleStore {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sampler_state (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every stored entry, ordered by key.
    #[instrument(skip(self), fields(repo = "state", operation = "list_state"))]
    pub async fn list_state(&self) -> anyhow::Result<Vec<StateEntry>> {
        let rows = sqlx::query("SELECT key, data, updated_at FROM sampler_state ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let data: Vec<u8> = row.try_get("data")?;
            let updated_at: i64 = row.try_get("updated_at")?;
            out.push(StateEntry {
                key,
                updated_at,
                value: decode_any(&data),
            });
        }
        Ok(out)
    }

    async fn load_blob(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT data FROM sampler_state WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row.try_get("data")?))
    }

    async fn store_blob(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        let updated_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_millis() as i64;
        sqlx::query(
            "INSERT INTO sampler_state (key, data, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(data)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl SampleStore for SqliteSampleStore {
    #[instrument(skip(self), fields(repo = "state", operation = "get_sample"))]
    async fn get(&self, key: &str) -> anyhow::Result<Option<RawSample>> {
        let Some(data) = self.load_blob(key).await? else {
            return Ok(None);
        };
        Ok(decode_sample(&data))
    }

    #[instrument(skip(self, sample), fields(repo = "state", operation = "set_sample"))]
    async fn set(&self, key: &str, sample: &RawSample) -> anyhow::Result<()> {
        let data = blob::with_kind_prefix(
            blob::BLOB_KIND_SAMPLE,
            wincode::serialize(sample).map_err(|e| anyhow::anyhow!("wincode: {}", e))?,
        );
        self.store_blob(key, &data).await
    }

    #[instrument(skip(self), fields(repo = "state", operation = "get_window"))]
    async fn get_window(&self, key: &str) -> anyhow::Result<Option<WindowState>> {
        let Some(data) = self.load_blob(key).await? else {
            return Ok(None);
        };
        Ok(decode_window(&data))
    }

    #[instrument(skip(self, state), fields(repo = "state", operation = "set_window"))]
    async fn set_window(&self, key: &str, state: &WindowState) -> anyhow::Result<()> {
        let data = blob::with_kind_prefix(
            blob::BLOB_KIND_WINDOW,
            wincode::serialize(state).map_err(|e| anyhow::anyhow!("wincode: {}", e))?,
        );
        self.store_blob(key, &data).await
    }
}

/// Wrong kind or corrupt payload reads as absent.
fn decode_sample(bytes: &[u8]) -> Option<RawSample> {
    let payload = blob::blob_payload(bytes, blob::BLOB_KIND_SAMPLE)?;
    wincode::deserialize::<RawSample>(payload)
        .map_err(|e| tracing::debug!(error = %e, "wincode deserialize sample, treating as absent"))
        .ok()
}

fn decode_window(bytes: &[u8]) -> Option<WindowState> {
    let payload = blob::blob_payload(bytes, blob::BLOB_KIND_WINDOW)?;
    wincode::deserialize::<WindowState>(payload)
        .map_err(|e| tracing::debug!(error = %e, "wincode deserialize window, treating as absent"))
        .ok()
}

fn decode_any(bytes: &[u8]) -> StoredValue {
    let decoded = match blob::blob_kind(bytes) {
        blob::BLOB_KIND_SAMPLE => decode_sample(bytes).map(StoredValue::Sample),
        blob::BLOB_KIND_WINDOW => decode_window(bytes).map(StoredValue::Window),
        _ => None,
    };
    decoded.unwrap_or(StoredValue::Unreadable {
        blob_kind: blob::blob_kind(bytes),
        len: bytes.len(),
    })
}
