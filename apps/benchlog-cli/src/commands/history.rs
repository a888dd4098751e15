//! `benchlog history`

use anyhow::Result;
use benchlog_core::{BenchConfig, BenchmarkRecord, LogKey};
use benchlog_store::collect_history;
use colored::Colorize;
use std::process::ExitCode;

use crate::output::{self, OutputFormat};

pub async fn run(config: &BenchConfig, model: &str, prompt: &str, format: OutputFormat) -> Result<ExitCode> {
    let stores = benchlog_store::open(config).await?;
    let key = LogKey::new(model, prompt);

    let mut records = collect_history(stores.log.as_ref(), &key, config.storage.page_size).await?;
    oldest_first(&mut records);

    match format {
        OutputFormat::Json => output::print_json(&records)?,
        OutputFormat::Text => print_records(&key, &records),
    }
    Ok(ExitCode::SUCCESS)
}

fn oldest_first(records: &mut [BenchmarkRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.output_hash.cmp(&b.output_hash)));
}

fn print_records(key: &LogKey, records: &[BenchmarkRecord]) {
    output::section(&format!("History for {}", key));
    if records.is_empty() {
        output::dimmed("No records");
        return;
    }

    for record in records {
        let rating = record
            .rating
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unrated".to_string());
        println!(
            "{}  {}  {} in / {} out  {:.0}ms  {}",
            record.date.to_rfc3339().cyan(),
            output::short_hash(&record.output_hash).yellow(),
            record.input_token_count,
            record.output_token_count,
            record.latency_ms,
            rating.dimmed()
        );
        println!("    {}", output::preview(&record.output, 100));
    }
}
