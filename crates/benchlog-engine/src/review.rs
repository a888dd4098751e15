//! Read side of the human review workflow
//!
//! Reviewers compare each key's latest record with the one before it and
//! attach a rating to the latest.

use benchlog_core::{BenchmarkRecord, LogKey, Rating};
use benchlog_store::{collect_all, LogStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::BenchResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewPair {
    pub key: LogKey,
    pub latest: BenchmarkRecord,
    pub previous: Option<BenchmarkRecord>,
}

impl ReviewPair {
    pub fn output_changed(&self) -> bool {
        self.previous
            .as_ref()
            .map_or(true, |previous| previous.output_hash != self.latest.output_hash)
    }

    pub fn needs_rating(&self) -> bool {
        self.latest.rating.is_none()
    }
}

/// Latest record and its predecessor for every key, ordered by key
pub fn pair_latest_with_previous(records: Vec<BenchmarkRecord>) -> Vec<ReviewPair> {
    let mut by_key: BTreeMap<LogKey, Vec<BenchmarkRecord>> = BTreeMap::new();
    for record in records {
        by_key.entry(record.key()).or_default().push(record);
    }

    by_key
        .into_iter()
        .filter_map(|(key, mut records)| {
            records.sort_by(|a, b| {
                b.date
                    .cmp(&a.date)
                    .then_with(|| b.output_hash.cmp(&a.output_hash))
            });
            let mut newest_first = records.into_iter();
            let latest = newest_first.next()?;
            Some(ReviewPair {
                key,
                latest,
                previous: newest_first.next(),
            })
        })
        .collect()
}

pub async fn load_review_pairs(store: &dyn LogStore, page_size: usize) -> BenchResult<Vec<ReviewPair>> {
    let records = collect_all(store, page_size).await?;
    Ok(pair_latest_with_previous(records))
}

/// Rating write-back for one record
pub async fn rate(
    store: &dyn LogStore,
    key: &LogKey,
    date: DateTime<Utc>,
    rating: Rating,
) -> BenchResult<()> {
    store.set_rating(key, date, rating).await?;
    info!(key = %key, date = %date.to_rfc3339(), rating = u8::from(rating), "Rating recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchlog_store::MemoryLogStore;
    use chrono::{Duration, TimeZone};

    fn record(model: &str, prompt: &str, hours: i64, hash: &str) -> BenchmarkRecord {
        let key = LogKey::new(model, prompt);
        BenchmarkRecord {
            model_prompt_id: key.composite(),
            prompt_model_id: key.reverse(),
            model_id: key.model_id,
            prompt_id: key.prompt_id,
            date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::hours(hours),
            output: hash.to_string(),
            output_hash: hash.to_string(),
            output_token_count: 0,
            input_token_count: 0,
            latency_ms: 0.0,
            model_config: "{}".to_string(),
            rating: None,
        }
    }

    #[test]
    fn test_pairs_latest_with_predecessor() {
        let pairs = pair_latest_with_previous(vec![
            record("meta.llama3-8b-instruct-v1:0", "code_100", 5, "c"),
            record("meta.llama3-8b-instruct-v1:0", "code_100", 1, "a"),
            record("ai21.j2-mid-v1", "code_100", 0, "solo"),
            record("meta.llama3-8b-instruct-v1:0", "code_100", 3, "b"),
        ]);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].key.model_id, "ai21.j2-mid-v1");
        assert!(pairs[0].previous.is_none());
        assert!(pairs[0].output_changed());

        assert_eq!(pairs[1].latest.output_hash, "c");
        assert_eq!(pairs[1].previous.as_ref().unwrap().output_hash, "b");
    }

    #[tokio::test]
    async fn test_rate_latest_record() {
        let latest = record("mistral.mistral-7b-instruct-v0:2", "reflexion_1500", 2, "x");
        let store = MemoryLogStore::with_records(vec![latest.clone()]);

        let pairs = load_review_pairs(&store, 10).await.unwrap();
        assert!(pairs[0].needs_rating());

        rate(&store, &pairs[0].key, pairs[0].latest.date, Rating::Correct)
            .await
            .unwrap();

        let pairs = load_review_pairs(&store, 10).await.unwrap();
        assert_eq!(pairs[0].latest.rating, Some(Rating::Correct));
        assert!(!pairs[0].needs_rating());
    }
}
