//! In-process stores for tests and dry runs

use async_trait::async_trait;
use benchlog_core::{BenchmarkRecord, LogKey, PromptEntry, Rating};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{page_from, ContinuationToken, LogStore, PromptCatalog, ScanPage};

/// Order in which scans deliver records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    #[default]
    Insertion,
    Reversed,
    /// Deterministic shuffle, stable across the pages of one scan
    Shuffled(u64),
}

#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: RwLock<Vec<BenchmarkRecord>>,
    order: ScanOrder,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<BenchmarkRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            order: ScanOrder::Insertion,
        }
    }

    pub fn with_scan_order(mut self, order: ScanOrder) -> Self {
        self.order = order;
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Every record in insertion order
    pub async fn snapshot(&self) -> Vec<BenchmarkRecord> {
        self.records.read().await.clone()
    }

    pub async fn count_for(&self, key: &LogKey) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.belongs_to(key))
            .count()
    }

    fn arrange(&self, mut records: Vec<BenchmarkRecord>) -> Vec<BenchmarkRecord> {
        match self.order {
            ScanOrder::Insertion => {}
            ScanOrder::Reversed => records.reverse(),
            ScanOrder::Shuffled(seed) => records.shuffle(&mut StdRng::seed_from_u64(seed)),
        }
        records
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
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
        page_from(self.arrange(matching), start.as_ref(), limit)
    }

    async fn put(&self, record: BenchmarkRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        insert_new(&mut records, record)
    }

    async fn set_rating(
        &self,
        key: &LogKey,
        date: DateTime<Utc>,
        rating: Rating,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        apply_rating(&mut records, key, date, rating)
    }

    async fn scan_all(
        &self,
        start: Option<ContinuationToken>,
        limit: usize,
    ) -> StoreResult<ScanPage> {
        let all = self.records.read().await.clone();
        page_from(self.arrange(all), start.as_ref(), limit)
    }
}

pub(crate) fn insert_new(
    records: &mut Vec<BenchmarkRecord>,
    record: BenchmarkRecord,
) -> StoreResult<()> {
    let exists = records
        .iter()
        .any(|r| r.belongs_to(&record.key()) && r.date == record.date);
    if exists {
        return Err(StoreError::Duplicate {
            key: record.model_prompt_id,
            date: record.date,
        });
    }
    records.push(record);
    Ok(())
}

pub(crate) fn apply_rating(
    records: &mut [BenchmarkRecord],
    key: &LogKey,
    date: DateTime<Utc>,
    rating: Rating,
) -> StoreResult<()> {
    let record = records
        .iter_mut()
        .find(|r| r.belongs_to(key) && r.date == date)
        .ok_or_else(|| StoreError::NotFound(format!("{} at {}", key, date.to_rfc3339())))?;
    record.rating = Some(rating);
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryPromptCatalog {
    prompts: Vec<PromptEntry>,
}

impl MemoryPromptCatalog {
    pub fn new(prompts: Vec<PromptEntry>) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl PromptCatalog for MemoryPromptCatalog {
    async fn load_all(&self) -> StoreResult<Vec<PromptEntry>> {
        let mut prompts = self.prompts.clone();
        prompts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(prompts)
    }
}
