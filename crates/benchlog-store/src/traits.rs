use async_trait::async_trait;
use benchlog_core::{BenchmarkRecord, LogKey, PromptEntry, Rating};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Opaque position in a paginated scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_offset(offset: usize) -> Self {
        Self(offset.to_string())
    }

    pub(crate) fn offset(&self) -> StoreResult<usize> {
        self.0
            .parse()
            .map_err(|_| StoreError::InvalidToken(self.0.clone()))
    }

    pub(crate) fn from_seq(seq: i64) -> Self {
        Self(seq.to_string())
    }

    pub(crate) fn seq(&self) -> StoreResult<i64> {
        self.0
            .parse()
            .map_err(|_| StoreError::InvalidToken(self.0.clone()))
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a scan; `next` is `None` on the last page
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub records: Vec<BenchmarkRecord>,
    pub next: Option<ContinuationToken>,
}

/// Read-only prompt source, loaded once per run
#[async_trait]
pub trait PromptCatalog: Send + Sync {
    /// Every prompt, sorted by id
    async fn load_all(&self) -> StoreResult<Vec<PromptEntry>>;
}

/// Append-mostly benchmark history.
///
/// Scan order within a key is unspecified; callers that need the latest
/// record must sort by `date` themselves.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Equality-filtered scan on the composite `model_prompt` key
    async fn scan_page(
        &self,
        key: &LogKey,
        start: Option<ContinuationToken>,
        limit: usize,
    ) -> StoreResult<ScanPage>;

    /// Insert a new record; an existing (key, date) is never overwritten
    async fn put(&self, record: BenchmarkRecord) -> StoreResult<()>;

    /// Attach a review rating to an existing record
    async fn set_rating(
        &self,
        key: &LogKey,
        date: DateTime<Utc>,
        rating: Rating,
    ) -> StoreResult<()>;

    /// Unfiltered scan over every key
    async fn scan_all(&self, start: Option<ContinuationToken>, limit: usize)
        -> StoreResult<ScanPage>;
}

/// Slice a materialized record list into a page
pub(crate) fn page_from(
    records: Vec<BenchmarkRecord>,
    start: Option<&ContinuationToken>,
    limit: usize,
) -> StoreResult<ScanPage> {
    let offset = match start {
        Some(token) => token.offset()?,
        None => 0,
    };
    let len = records.len();
    let begin = offset.min(len);
    let end = offset.saturating_add(limit.max(1)).min(len);

    let next = (end < len).then(|| ContinuationToken::from_offset(end));
    let records = records.into_iter().skip(begin).take(end - begin).collect();

    Ok(ScanPage { records, next })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(n: i64) -> BenchmarkRecord {
        let key = LogKey::new("meta.llama3-8b-instruct-v1:0", "code_100");
        BenchmarkRecord {
            model_prompt_id: key.composite(),
            prompt_model_id: key.reverse(),
            model_id: key.model_id.clone(),
            prompt_id: key.prompt_id.clone(),
            date: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
            output: n.to_string(),
            output_hash: String::new(),
            output_token_count: 0,
            input_token_count: 0,
            latency_ms: 0.0,
            model_config: "{}".to_string(),
            rating: None,
        }
    }

    #[test]
    fn test_page_from_walks_to_the_end() {
        let records: Vec<_> = (0..5).map(record).collect();

        let first = page_from(records.clone(), None, 2).unwrap();
        assert_eq!(first.records.len(), 2);
        let token = first.next.unwrap();
        assert_eq!(token.as_str(), "2");

        let second = page_from(records.clone(), Some(&token), 2).unwrap();
        assert_eq!(second.records[0].output, "2");

        let last = page_from(records, second.next.as_ref(), 2).unwrap();
        assert_eq!(last.records.len(), 1);
        assert!(last.next.is_none());
    }

    #[test]
    fn test_page_from_rejects_garbage_token() {
        let err = page_from(vec![], Some(&ContinuationToken::new("abc")), 10).unwrap_err();
        assert!(matches!(err, StoreError::InvalidToken(_)));
    }

    #[test]
    fn test_empty_scan_has_no_continuation() {
        let page = page_from(vec![], None, 10).unwrap();
        assert!(page.records.is_empty());
        assert!(page.next.is_none());
    }
}
