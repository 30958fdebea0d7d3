use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS perm_processing_times (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    average_days REAL NOT NULL,
    priority_date TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    data_source TEXT NOT NULL DEFAULT 'live'
)";

/// Marks whether the current record came from a real scrape or from
/// fallback substitution after a failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Fallback,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Fallback => "fallback",
        }
    }

    fn from_column(value: &str) -> Self {
        match value {
            "fallback" => DataSource::Fallback,
            _ => DataSource::Live,
        }
    }
}

/// The single authoritative processing-time data point used for all estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTimeRecord {
    pub average_days: f64,
    pub priority_date: String,
    pub last_updated: DateTime<Utc>,
    pub data_source: DataSource,
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Storage abstraction so the pipeline can be exercised without SQLite.
///
/// The store holds zero or one current record. `replace` is the only write
/// path and must be atomic: either the previous record survives intact or the
/// new one fully supersedes it.
#[async_trait]
pub trait ProcessingTimeStore: Send + Sync {
    async fn replace(&self, record: ProcessingTimeRecord) -> Result<(), StoreError>;
    async fn current(&self) -> Result<Option<ProcessingTimeRecord>, StoreError>;
}

/// SQLite-backed store. The table never holds more than one row at steady
/// state; `replace` deletes prior rows and inserts the new one in a single
/// transaction.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests. Capped at one connection
    /// since each SQLite `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ProcessingTimeStore for SqliteStore {
    async fn replace(&self, record: ProcessingTimeRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM perm_processing_times")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO perm_processing_times \
             (average_days, priority_date, last_updated, data_source) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(record.average_days)
        .bind(&record.priority_date)
        .bind(record.last_updated)
        .bind(record.data_source.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn current(&self) -> Result<Option<ProcessingTimeRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT average_days, priority_date, last_updated, data_source \
             FROM perm_processing_times ORDER BY last_updated DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ProcessingTimeRecord {
            average_days: row.get("average_days"),
            priority_date: row.get("priority_date"),
            last_updated: row.get("last_updated"),
            data_source: DataSource::from_column(&row.get::<String, _>("data_source")),
        }))
    }
}
