//! PostgreSQL stores
//!
//! Tables are named after the configured store identifiers. Scans use a
//! surrogate `seq` column for keyset pagination; its last value on a page
//! is the continuation token.

use async_trait::async_trait;
use benchlog_core::{BenchmarkRecord, LogKey, PromptEntry, Rating};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ContinuationToken, LogStore, PromptCatalog, ScanPage};
use crate::validate_identifier;

const RECORD_COLUMNS: &str = "seq, model_prompt_id, prompt_model_id, model_id, prompt_id, date, \
     output, output_hash, output_token_count, input_token_count, latency_ms, model_config, rating";

pub async fn connect(database_url: &str, acquire_timeout: Duration) -> StoreResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct PgLogStore {
    pool: PgPool,
    table: String,
}

impl PgLogStore {
    pub fn new(pool: PgPool, table: &str) -> StoreResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                seq BIGSERIAL PRIMARY KEY,
                model_prompt_id TEXT NOT NULL,
                prompt_model_id TEXT NOT NULL,
                model_id TEXT NOT NULL,
                prompt_id TEXT NOT NULL,
                date TIMESTAMPTZ NOT NULL,
                output TEXT NOT NULL,
                output_hash TEXT NOT NULL,
                output_token_count BIGINT NOT NULL,
                input_token_count BIGINT NOT NULL,
                latency_ms DOUBLE PRECISION NOT NULL,
                model_config TEXT NOT NULL,
                rating SMALLINT,
                UNIQUE (model_id, prompt_id, date)
            )",
            table = self.table
        );
        let index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_model_prompt_seq_idx ON {table} (model_prompt_id, seq)",
            table = self.table
        );

        sqlx::query(&create).execute(&self.pool).await?;
        sqlx::query(&index).execute(&self.pool).await?;
        info!(table = %self.table, "Benchmark log schema ready");
        Ok(())
    }

    fn page(rows: Vec<PgRow>, limit: usize) -> StoreResult<ScanPage> {
        let has_more = rows.len() > limit;
        let mut records = Vec::with_capacity(rows.len().min(limit));
        let mut last_seq = None;

        for row in rows.into_iter().take(limit) {
            last_seq = Some(row.try_get::<i64, _>("seq")?);
            records.push(record_from_row(&row)?);
        }

        let next = match (has_more, last_seq) {
            (true, Some(seq)) => Some(ContinuationToken::from_seq(seq)),
            _ => None,
        };
        Ok(ScanPage { records, next })
    }
}

fn to_i64(value: u64, field: &str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidRecord(format!("{} out of range", field)))
}

fn record_from_row(row: &PgRow) -> StoreResult<BenchmarkRecord> {
    let count = |column: &str| -> StoreResult<u64> {
        let value: i64 = row.try_get(column)?;
        u64::try_from(value)
            .map_err(|_| StoreError::InvalidRecord(format!("negative {}", column)))
    };

    let rating = match row.try_get::<Option<i16>, _>("rating")? {
        Some(value) => {
            let value = u8::try_from(value)
                .map_err(|_| StoreError::InvalidRecord(format!("rating {}", value)))?;
            Some(Rating::try_from(value).map_err(|e| StoreError::InvalidRecord(e.to_string()))?)
        }
        None => None,
    };

    Ok(BenchmarkRecord {
        model_prompt_id: row.try_get("model_prompt_id")?,
        prompt_model_id: row.try_get("prompt_model_id")?,
        model_id: row.try_get("model_id")?,
        prompt_id: row.try_get("prompt_id")?,
        date: row.try_get("date")?,
        output: row.try_get("output")?,
        output_hash: row.try_get("output_hash")?,
        output_token_count: count("output_token_count")?,
        input_token_count: count("input_token_count")?,
        latency_ms: row.try_get("latency_ms")?,
        model_config: row.try_get("model_config")?,
        rating,
    })
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn scan_page(
        &self,
        key: &LogKey,
        start: Option<ContinuationToken>,
        limit: usize,
    ) -> StoreResult<ScanPage> {
        let limit = limit.max(1);
        let after = start.as_ref().map(ContinuationToken::seq).transpose()?.unwrap_or(0);
        let sql = format!(
            "SELECT {columns} FROM {table} WHERE model_prompt_id = $1 AND model_id = $2 AND prompt_id = $3 \
             AND seq > $4 ORDER BY seq LIMIT $5",
            columns = RECORD_COLUMNS,
            table = self.table
        );

        let rows = sqlx::query(&sql)
            .bind(key.composite())
            .bind(&key.model_id)
            .bind(&key.prompt_id)
            .bind(after)
            .bind(limit as i64 + 1)
            .fetch_all(&self.pool)
            .await?;

        debug!(key = %key, rows = rows.len(), "Scanned benchmark log page");
        Self::page(rows, limit)
    }

    async fn put(&self, record: BenchmarkRecord) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {table} (model_prompt_id, prompt_model_id, model_id, prompt_id, date, \
             output, output_hash, output_token_count, input_token_count, latency_ms, model_config, rating) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (model_id, prompt_id, date) DO NOTHING",
            table = self.table
        );

        let result = sqlx::query(&sql)
            .bind(&record.model_prompt_id)
            .bind(&record.prompt_model_id)
            .bind(&record.model_id)
            .bind(&record.prompt_id)
            .bind(record.date)
            .bind(&record.output)
            .bind(&record.output_hash)
            .bind(to_i64(record.output_token_count, "output_token_count")?)
            .bind(to_i64(record.input_token_count, "input_token_count")?)
            .bind(record.latency_ms)
            .bind(&record.model_config)
            .bind(record.rating.map(|r| u8::from(r) as i16))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate {
                key: record.model_prompt_id,
                date: record.date,
            });
        }
        Ok(())
    }

    async fn set_rating(
        &self,
        key: &LogKey,
        date: DateTime<Utc>,
        rating: Rating,
    ) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {table} SET rating = $1 WHERE model_prompt_id = $2 AND model_id = $3 \
             AND prompt_id = $4 AND date = $5",
            table = self.table
        );

        let result = sqlx::query(&sql)
            .bind(u8::from(rating) as i16)
            .bind(key.composite())
            .bind(&key.model_id)
            .bind(&key.prompt_id)
            .bind(date)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} at {}", key, date.to_rfc3339())));
        }
        Ok(())
    }

    async fn scan_all(
        &self,
        start: Option<ContinuationToken>,
        limit: usize,
    ) -> StoreResult<ScanPage> {
        let limit = limit.max(1);
        let after = start.as_ref().map(ContinuationToken::seq).transpose()?.unwrap_or(0);
        let sql = format!(
            "SELECT {columns} FROM {table} WHERE seq > $1 ORDER BY seq LIMIT $2",
            columns = RECORD_COLUMNS,
            table = self.table
        );

        let rows = sqlx::query(&sql)
            .bind(after)
            .bind(limit as i64 + 1)
            .fetch_all(&self.pool)
            .await?;

        Self::page(rows, limit)
    }
}

#[derive(Debug, Clone)]
pub struct PgPromptCatalog {
    pool: PgPool,
    table: String,
}

impl PgPromptCatalog {
    pub fn new(pool: PgPool, table: &str) -> StoreResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (id TEXT PRIMARY KEY, prompt TEXT NOT NULL)",
            table = self.table
        );
        sqlx::query(&create).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PromptCatalog for PgPromptCatalog {
    async fn load_all(&self) -> StoreResult<Vec<PromptEntry>> {
        let sql = format!("SELECT id, prompt FROM {} ORDER BY id", self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> StoreResult<PromptEntry> {
                Ok(PromptEntry::new(
                    row.try_get::<String, _>("id")?,
                    row.try_get::<String, _>("prompt")?,
                ))
            })
            .collect()
    }
}
