//! Run-level outcome of one benchmark pass

use benchlog_core::{LogKey, ModelFamily};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unknown family or unusable configuration; never retried
    Configuration,
    AdapterParse,
    Invocation,
    StoreAccess,
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Configuration => "configuration",
            FailureKind::AdapterParse => "adapter_parse",
            FailureKind::Invocation => "invocation",
            FailureKind::StoreAccess => "store_access",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Success => "success",
            RunStatus::PartialFailure => "partial_failure",
            RunStatus::Failure => "failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PairResult {
    Persisted {
        output_hash: String,
        date: DateTime<Utc>,
        first: bool,
    },
    Unchanged {
        output_hash: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

/// What happened to one (prompt, model) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairOutcome {
    pub model_id: String,
    pub prompt_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ModelFamily>,
    #[serde(flatten)]
    pub result: PairResult,
}

impl PairOutcome {
    pub fn key(&self) -> LogKey {
        LogKey::new(self.model_id.clone(), self.prompt_id.clone())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.result, PairResult::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.result {
            PairResult::Failed { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// A failed pair, enumerated for operator follow-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub model_id: String,
    pub prompt_id: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub pairs: usize,
    pub persisted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub totals: RunTotals,
    pub pairs: Vec<PairOutcome>,
    pub failures: Vec<PairFailure>,
}

impl RunReport {
    pub fn from_outcomes(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        pairs: Vec<PairOutcome>,
    ) -> Self {
        let mut totals = RunTotals {
            pairs: pairs.len(),
            ..Default::default()
        };
        let mut failures = Vec::new();

        for pair in &pairs {
            match &pair.result {
                PairResult::Persisted { .. } => totals.persisted += 1,
                PairResult::Unchanged { .. } => totals.unchanged += 1,
                PairResult::Failed { kind, message } => {
                    totals.failed += 1;
                    failures.push(PairFailure {
                        model_id: pair.model_id.clone(),
                        prompt_id: pair.prompt_id.clone(),
                        kind: *kind,
                        message: message.clone(),
                    });
                }
            }
        }

        let status = status_of(&pairs);
        Self {
            run_id,
            started_at,
            finished_at,
            status,
            totals,
            pairs,
            failures,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Number of failures per kind, in a stable order
    pub fn failures_by_kind(&self) -> Vec<(FailureKind, usize)> {
        let kinds = [
            FailureKind::Configuration,
            FailureKind::AdapterParse,
            FailureKind::Invocation,
            FailureKind::StoreAccess,
            FailureKind::Timeout,
        ];
        kinds
            .into_iter()
            .map(|kind| (kind, self.failures.iter().filter(|f| f.kind == kind).count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Structured completion signal for whatever triggered the run
    pub fn completion(&self) -> RunCompletion {
        let summary = format!(
            "{} pairs: {} persisted, {} unchanged, {} failed",
            self.totals.pairs, self.totals.persisted, self.totals.unchanged, self.totals.failed
        );

        match self.status {
            RunStatus::Success => RunCompletion {
                status: 200,
                message: format!("Benchmark run complete; {}", summary),
            },
            RunStatus::PartialFailure | RunStatus::Failure => {
                let failed: Vec<String> = self
                    .failures
                    .iter()
                    .map(|f| format!("{}/{} ({})", f.model_id, f.prompt_id, f.kind))
                    .collect();
                RunCompletion {
                    status: 500,
                    message: format!(
                        "Benchmark run {}; {}; failed: {}",
                        self.status,
                        summary,
                        failed.join(", ")
                    ),
                }
            }
        }
    }
}

fn status_of(pairs: &[PairOutcome]) -> RunStatus {
    let failed: Vec<FailureKind> = pairs.iter().filter_map(PairOutcome::failure_kind).collect();

    if failed.is_empty() {
        RunStatus::Success
    } else if failed.len() == pairs.len()
        && failed.iter().all(|kind| *kind == FailureKind::StoreAccess)
    {
        RunStatus::Failure
    } else {
        RunStatus::PartialFailure
    }
}

/// `{status: 200|500, message}` handed back to the trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCompletion {
    pub status: u16,
    pub message: String,
}

impl RunCompletion {
    /// Completion for a run that could not start, e.g. the catalog was unreadable
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            message: message.into(),
        }
    }
}
