//! `benchlog rate`

use anyhow::{Context, Result};
use benchlog_core::{BenchConfig, LogKey, Rating};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::process::ExitCode;

use crate::output::{self, OutputFormat};

pub async fn run(
    config: &BenchConfig,
    model: &str,
    prompt: &str,
    date: &str,
    rating: u8,
    format: OutputFormat,
) -> Result<ExitCode> {
    let date = parse_date(date)?;
    let rating = Rating::try_from(rating)?;
    let key = LogKey::new(model, prompt);

    let stores = benchlog_store::open(config).await?;
    benchlog_engine::rate(stores.log.as_ref(), &key, date, rating).await?;

    match format {
        OutputFormat::Json => output::print_json(&json!({
            "model_id": key.model_id,
            "prompt_id": key.prompt_id,
            "date": date,
            "rating": rating,
        }))?,
        OutputFormat::Text => output::success(&format!("Rated {} at {} as {}", key, date.to_rfc3339(), rating)),
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let date = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid record date '{}', expected RFC 3339", raw))?;
    Ok(date.with_timezone(&Utc))
}
