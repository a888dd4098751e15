//! JSON document stores under `data_dir/<identifier>.json`

use async_trait::async_trait;
use benchlog_core::{BenchmarkRecord, LogKey, PromptEntry, Rating};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::memory::{apply_rating, insert_new};
use crate::traits::{page_from, ContinuationToken, LogStore, PromptCatalog, ScanPage};
use crate::validate_identifier;

fn document_path(data_dir: &Path, identifier: &str) -> StoreResult<PathBuf> {
    validate_identifier(identifier)?;
    Ok(data_dir.join(format!("{}.json", identifier)))
}

/// Benchmark log kept as one JSON array, rewritten on every change
#[derive(Debug)]
pub struct FileLogStore {
    path: PathBuf,
    records: RwLock<Vec<BenchmarkRecord>>,
}

impl FileLogStore {
    /// Open the log, starting empty when the document does not exist yet
    pub async fn open(data_dir: impl AsRef<Path>, identifier: &str) -> StoreResult<Self> {
        let path = document_path(data_dir.as_ref(), identifier)?;

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::Unavailable(format!("{}: {}", path.display(), e))),
        };

        debug!(path = %path.display(), records = records.len(), "Opened file log store");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[BenchmarkRecord]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn scan_page(
        &self,
        key: &LogKey,
        start: Option<ContinuationToken>,
        limit: usize,
    ) -> StoreResult<ScanPage> {
        let matching = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.belongs_to(key))
            .cloned()
            .collect();
        page_from(matching, start.as_ref(), limit)
    }

    async fn put(&self, record: BenchmarkRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        insert_new(&mut records, record)?;
        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn set_rating(
        &self,
        key: &LogKey,
        date: DateTime<Utc>,
        rating: Rating,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let mut updated = records.clone();
        apply_rating(&mut updated, key, date, rating)?;
        self.persist(&updated).await?;
        *records = updated;
        Ok(())
    }

    async fn scan_all(
        &self,
        start: Option<ContinuationToken>,
        limit: usize,
    ) -> StoreResult<ScanPage> {
        let all = self.records.read().await.clone();
        page_from(all, start.as_ref(), limit)
    }
}

/// Prompt catalog read from a JSON array of `{id, prompt}` objects
#[derive(Debug, Clone)]
pub struct FilePromptCatalog {
    path: PathBuf,
}

impl FilePromptCatalog {
    pub fn new(data_dir: impl AsRef<Path>, identifier: &str) -> StoreResult<Self> {
        Ok(Self {
            path: document_path(data_dir.as_ref(), identifier)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PromptCatalog for FilePromptCatalog {
    async fn load_all(&self) -> StoreResult<Vec<PromptEntry>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!(
                    "prompt catalog {}",
                    self.path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let mut prompts: Vec<PromptEntry> = serde_json::from_slice(&bytes)?;
        prompts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(prompts)
    }
}
