//! Lazy history scans
//!
//! A scan is a stream of pages that ends on the first page without a
//! continuation token.

use benchlog_core::{BenchmarkRecord, LogKey};
use futures::stream::{self, Stream, TryStreamExt};

use crate::error::StoreResult;
use crate::traits::{ContinuationToken, LogStore};

/// Pages of every record stored under `key`, in store order
pub fn history<'a, S>(
    store: &'a S,
    key: &'a LogKey,
    page_size: usize,
) -> impl Stream<Item = StoreResult<Vec<BenchmarkRecord>>> + Send + 'a
where
    S: LogStore + ?Sized,
{
    stream::try_unfold(Some(None::<ContinuationToken>), move |state| async move {
        let Some(start) = state else {
            return Ok(None);
        };

        let page = store.scan_page(key, start, page_size).await?;
        Ok(Some((page.records, page.next.map(Some))))
    })
}

/// Drain every page for `key`
pub async fn collect_history<S>(
    store: &S,
    key: &LogKey,
    page_size: usize,
) -> StoreResult<Vec<BenchmarkRecord>>
where
    S: LogStore + ?Sized,
{
    history(store, key, page_size).try_concat().await
}

/// Pages of the whole log, for the review side
pub fn full_scan<'a, S>(
    store: &'a S,
    page_size: usize,
) -> impl Stream<Item = StoreResult<Vec<BenchmarkRecord>>> + Send + 'a
where
    S: LogStore + ?Sized,
{
    stream::try_unfold(Some(None::<ContinuationToken>), move |state| async move {
        let Some(start) = state else {
            return Ok(None);
        };

        let page = store.scan_all(start, page_size).await?;
        Ok(Some((page.records, page.next.map(Some))))
    })
}

pub async fn collect_all<S>(store: &S, page_size: usize) -> StoreResult<Vec<BenchmarkRecord>>
where
    S: LogStore + ?Sized,
{
    full_scan(store, page_size).try_concat().await
}
