//! Change detection over the benchmark log
//!
//! A new record is appended only when the output fingerprint differs from
//! the chronologically latest record of the same key. Only that single
//! record is compared, so an output that flips back to an older value is
//! stored again.

use benchlog_adapters::{ParsedResponse, TimeoutOrError, TimeoutPolicy};
use benchlog_core::{BenchmarkRecord, LogKey};
use benchlog_store::{collect_history, LogStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{BenchError, BenchResult};
use crate::fingerprint::{fingerprint, latest_record};

/// Outcome of observing one fresh output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DedupDecision {
    /// No prior history for the key
    First { record: BenchmarkRecord },
    /// Fingerprint differs from the latest record
    Changed {
        record: BenchmarkRecord,
        previous_hash: String,
    },
    /// Same fingerprint as the latest record; nothing written
    Unchanged {
        output_hash: String,
        latest_date: DateTime<Utc>,
    },
}

impl DedupDecision {
    pub fn persisted(&self) -> Option<&BenchmarkRecord> {
        match self {
            DedupDecision::First { record } | DedupDecision::Changed { record, .. } => Some(record),
            DedupDecision::Unchanged { .. } => None,
        }
    }

    pub fn output_hash(&self) -> &str {
        match self {
            DedupDecision::First { record } | DedupDecision::Changed { record, .. } => {
                &record.output_hash
            }
            DedupDecision::Unchanged { output_hash, .. } => output_hash,
        }
    }
}

pub struct DedupEngine {
    store: Arc<dyn LogStore>,
    page_size: usize,
    timeouts: TimeoutPolicy,
}

impl DedupEngine {
    pub fn new(store: Arc<dyn LogStore>, page_size: usize, timeouts: TimeoutPolicy) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            timeouts,
        }
    }

    /// Fingerprint `parsed.text`, compare it against the latest stored
    /// record for `key` and append a record when it changed.
    pub async fn observe(
        &self,
        key: &LogKey,
        parsed: &ParsedResponse,
        model_config: &str,
        now: DateTime<Utc>,
    ) -> BenchResult<DedupDecision> {
        let output_hash = fingerprint(&parsed.text);

        let history = self
            .timeouts
            .store("history_scan", || {
                collect_history(self.store.as_ref(), key, self.page_size)
            })
            .await
            .map_err(store_error)?;

        let latest = latest_record(&history);
        debug!(
            key = %key,
            history_len = history.len(),
            latest_date = ?latest.map(|r| r.date),
            "Loaded history"
        );

        let (date, previous_hash) = match latest {
            Some(latest) if latest.output_hash == output_hash => {
                debug!(key = %key, output_hash = %output_hash, "Output unchanged");
                return Ok(DedupDecision::Unchanged {
                    output_hash,
                    latest_date: latest.date,
                });
            }
            Some(latest) => (
                now.max(latest.date + Duration::milliseconds(1)),
                Some(latest.output_hash.clone()),
            ),
            None => (now, None),
        };

        let record = BenchmarkRecord {
            model_prompt_id: key.composite(),
            prompt_model_id: key.reverse(),
            model_id: key.model_id.clone(),
            prompt_id: key.prompt_id.clone(),
            date,
            output: parsed.text.clone(),
            output_hash,
            output_token_count: parsed.output_tokens,
            input_token_count: parsed.input_tokens,
            latency_ms: parsed.latency_ms,
            model_config: model_config.to_string(),
            rating: None,
        };

        self.timeouts
            .store("record_put", || self.store.put(record.clone()))
            .await
            .map_err(store_error)?;

        info!(
            key = %key,
            output_hash = %record.output_hash,
            date = %record.date.to_rfc3339(),
            "Persisted new benchmark record"
        );

        Ok(match previous_hash {
            Some(previous_hash) => DedupDecision::Changed {
                record,
                previous_hash,
            },
            None => DedupDecision::First { record },
        })
    }
}

fn store_error(error: TimeoutOrError<benchlog_store::StoreError>) -> BenchError {
    match error {
        TimeoutOrError::Timeout(timeout) => BenchError::StoreTimeout(timeout),
        TimeoutOrError::Error(e) => BenchError::Store(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchlog_store::{MemoryLogStore, ScanOrder};
    use chrono::TimeZone;

    fn parsed(text: &str) -> ParsedResponse {
        ParsedResponse {
            text: text.to_string(),
            output_tokens: 1,
            input_tokens: 5,
            latency_ms: 42.0,
        }
    }

    fn key() -> LogKey {
        LogKey::new("anthropic.claude-3-haiku-20240307-v1:0", "code_100")
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn engine(store: Arc<MemoryLogStore>) -> DedupEngine {
        DedupEngine::new(store, 2, TimeoutPolicy::default())
    }

    #[tokio::test]
    async fn test_first_observation_persists_empty_output() {
        let store = Arc::new(MemoryLogStore::new());
        let decision = engine(store.clone())
            .observe(&key(), &parsed(""), "{}", noon())
            .await
            .unwrap();

        assert!(matches!(decision, DedupDecision::First { .. }));
        assert_eq!(decision.output_hash(), fingerprint(""));
        assert_eq!(store.count_for(&key()).await, 1);
    }

    #[tokio::test]
    async fn test_unchanged_output_writes_nothing() {
        let store = Arc::new(MemoryLogStore::new());
        let engine = engine(store.clone());

        engine.observe(&key(), &parsed("4"), "{}", noon()).await.unwrap();
        let second = engine
            .observe(&key(), &parsed("4"), "{}", noon() + Duration::days(1))
            .await
            .unwrap();

        assert!(second.persisted().is_none());
        assert_eq!(store.count_for(&key()).await, 1);
    }

    #[tokio::test]
    async fn test_changed_output_appends_later_record() {
        let store = Arc::new(MemoryLogStore::new());
        let engine = engine(store.clone());

        let first = engine.observe(&key(), &parsed("4"), "{}", noon()).await.unwrap();
        let second = engine
            .observe(&key(), &parsed("five"), "{}", noon() + Duration::hours(1))
            .await
            .unwrap();

        let first_date = first.persisted().unwrap().date;
        match &second {
            DedupDecision::Changed {
                record,
                previous_hash,
            } => {
                assert_eq!(previous_hash, &fingerprint("4"));
                assert_eq!(record.output_hash, fingerprint("five"));
                assert!(record.date > first_date);
            }
            other => panic!("expected a change, got {:?}", other),
        }
        assert_eq!(store.count_for(&key()).await, 2);
    }

    #[tokio::test]
    async fn test_new_date_is_strictly_later_even_with_a_stale_clock() {
        let store = Arc::new(MemoryLogStore::new());
        let engine = engine(store.clone());

        engine.observe(&key(), &parsed("a"), "{}", noon()).await.unwrap();
        let second = engine
            .observe(&key(), &parsed("b"), "{}", noon() - Duration::hours(3))
            .await
            .unwrap();

        assert_eq!(
            second.persisted().unwrap().date,
            noon() + Duration::milliseconds(1)
        );
    }

    #[tokio::test]
    async fn test_compares_against_latest_not_first_delivered() {
        let k = key();
        let base = noon();
        let records = ["old", "older", "newest", "mid"]
            .iter()
            .zip([3, 1, 9, 5])
            .map(|(text, hours)| BenchmarkRecord {
                model_prompt_id: k.composite(),
                prompt_model_id: k.reverse(),
                model_id: k.model_id.clone(),
                prompt_id: k.prompt_id.clone(),
                date: base + Duration::hours(hours),
                output: text.to_string(),
                output_hash: fingerprint(text),
                output_token_count: 0,
                input_token_count: 0,
                latency_ms: 0.0,
                model_config: "{}".to_string(),
                rating: None,
            })
            .collect::<Vec<_>>();

        for order in [ScanOrder::Insertion, ScanOrder::Reversed, ScanOrder::Shuffled(3)] {
            let store = Arc::new(MemoryLogStore::with_records(records.clone()).with_scan_order(order));
            let decision = engine(store.clone())
                .observe(&k, &parsed("newest"), "{}", base + Duration::days(1))
                .await
                .unwrap();
            assert!(decision.persisted().is_none(), "{:?}", order);
            assert_eq!(store.count_for(&k).await, 4);
        }
    }

    #[tokio::test]
    async fn test_oscillating_output_is_stored_again() {
        let store = Arc::new(MemoryLogStore::new());
        let engine = engine(store.clone());

        for (i, text) in ["x", "y", "x"].iter().enumerate() {
            engine
                .observe(&key(), &parsed(text), "{}", noon() + Duration::hours(i as i64))
                .await
                .unwrap();
        }
        assert_eq!(store.count_for(&key()).await, 3);
    }

    #[tokio::test]
    async fn test_record_carries_provenance() {
        let store = Arc::new(MemoryLogStore::new());
        let decision = engine(store)
            .observe(&key(), &parsed("ok"), r#"{"max_tokens":300}"#, noon())
            .await
            .unwrap();
        let record = decision.persisted().unwrap();

        assert_eq!(record.model_prompt_id, "anthropic.claude-3-haiku-20240307-v1:0_code_100");
        assert_eq!(record.prompt_model_id, "code_100_anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(record.model_config, r#"{"max_tokens":300}"#);
        assert_eq!(record.input_token_count, 5);
        assert_eq!(record.latency_ms, 42.0);
        assert!(record.rating.is_none());
    }
}
