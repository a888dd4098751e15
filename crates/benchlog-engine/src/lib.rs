//! Benchmark execution and deduplication engine
//!
//! - [`fingerprint`]: stable content hashes and latest-record selection
//! - [`dedup`]: append-on-change decisions against the benchmark log
//! - [`orchestrator`]: one pass over prompts x models
//! - [`report`], [`markdown`], [`io`]: the run outcome and its files
//! - [`review`]: latest/previous pairing and rating write-back

pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod io;
pub mod markdown;
pub mod orchestrator;
pub mod report;
pub mod review;

pub use dedup::{DedupDecision, DedupEngine};
pub use error::{BenchError, BenchResult};
pub use fingerprint::{fingerprint, latest_record};
pub use io::{IoError, IoResult, ReportIo, WrittenReport};
pub use markdown::{MarkdownConfig, MarkdownGenerator};
pub use orchestrator::{resolve_models, RunOrchestrator, RunSettings};
pub use report::{
    FailureKind, PairFailure, PairOutcome, PairResult, RunCompletion, RunReport, RunStatus,
    RunTotals,
};
pub use review::{load_review_pairs, pair_latest_with_previous, rate, ReviewPair};
