//! Content fingerprints and latest-record selection

use benchlog_core::BenchmarkRecord;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text`.
///
/// Any family-specific normalization (Meta's leading-whitespace strip) has
/// already happened in the adapter; the text is hashed exactly as given.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// The record with the greatest `date`, whatever order `records` is in.
///
/// Ties on `date` fall back to the larger hash so the choice does not
/// depend on delivery order either.
pub fn latest_record(records: &[BenchmarkRecord]) -> Option<&BenchmarkRecord> {
    records
        .iter()
        .max_by(|a, b| a.date.cmp(&b.date).then_with(|| a.output_hash.cmp(&b.output_hash)))
}
