//! Markdown summary of a run

use std::fmt::{self, Write};

use crate::report::{PairResult, RunReport};

#[derive(Debug, Clone)]
pub struct MarkdownConfig {
    /// Include the per-pair table, not only the failures
    pub include_pairs: bool,
    /// Truncate failure messages to this many characters
    pub max_message_len: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            include_pairs: true,
            max_message_len: 120,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownGenerator {
    config: MarkdownConfig,
}

impl MarkdownGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MarkdownConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, report: &RunReport) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_report(&mut output, report);
        output
    }

    pub fn write_report(&self, out: &mut impl Write, report: &RunReport) -> fmt::Result {
        writeln!(out, "# Benchmark Run Summary")?;
        writeln!(out)?;
        writeln!(out, "- Run: `{}`", report.run_id)?;
        writeln!(out, "- Started: {}", report.started_at.to_rfc3339())?;
        writeln!(out, "- Finished: {}", report.finished_at.to_rfc3339())?;
        writeln!(out, "- Status: **{}**", report.status)?;
        writeln!(out)?;

        writeln!(out, "| Pairs | Persisted | Unchanged | Failed |")?;
        writeln!(out, "|-------|-----------|-----------|--------|")?;
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            report.totals.pairs, report.totals.persisted, report.totals.unchanged, report.totals.failed
        )?;
        writeln!(out)?;

        if !report.failures.is_empty() {
            writeln!(out, "## Failures")?;
            writeln!(out)?;
            for (kind, count) in report.failures_by_kind() {
                writeln!(out, "- {}: {}", kind, count)?;
            }
            writeln!(out)?;
            writeln!(out, "| Model | Prompt | Kind | Message |")?;
            writeln!(out, "|-------|--------|------|---------|")?;
            for failure in &report.failures {
                writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    failure.model_id,
                    failure.prompt_id,
                    failure.kind,
                    self.cell(&failure.message)
                )?;
            }
            writeln!(out)?;
        }

        if self.config.include_pairs && !report.pairs.is_empty() {
            writeln!(out, "## Pairs")?;
            writeln!(out)?;
            writeln!(out, "| Model | Prompt | Result | Hash |")?;
            writeln!(out, "|-------|--------|--------|------|")?;
            for pair in &report.pairs {
                let (result, hash) = match &pair.result {
                    PairResult::Persisted { output_hash, first: true, .. } => ("new", short(output_hash)),
                    PairResult::Persisted { output_hash, .. } => ("changed", short(output_hash)),
                    PairResult::Unchanged { output_hash } => ("unchanged", short(output_hash)),
                    PairResult::Failed { kind, .. } => {
                        writeln!(out, "| {} | {} | failed ({}) | - |", pair.model_id, pair.prompt_id, kind)?;
                        continue;
                    }
                };
                writeln!(out, "| {} | {} | {} | `{}` |", pair.model_id, pair.prompt_id, result, hash)?;
            }
            writeln!(out)?;
        }

        writeln!(out, "---")?;
        writeln!(out, "Duration: {} ms", report.duration_ms())
    }

    fn cell(&self, message: &str) -> String {
        let single_line = message.replace(['\n', '|'], " ");
        if single_line.chars().count() > self.config.max_message_len {
            let cut: String = single_line.chars().take(self.config.max_message_len).collect();
            format!("{}...", cut)
        } else {
            single_line
        }
    }
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
