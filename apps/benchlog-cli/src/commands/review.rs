//! `benchlog review`

use anyhow::Result;
use benchlog_core::BenchConfig;
use benchlog_engine::{load_review_pairs, ReviewPair};
use colored::Colorize;
use std::process::ExitCode;

use crate::output::{self, OutputFormat};

pub async fn run(config: &BenchConfig, unrated_only: bool, format: OutputFormat) -> Result<ExitCode> {
    let stores = benchlog_store::open(config).await?;
    let mut pairs = load_review_pairs(stores.log.as_ref(), config.storage.page_size).await?;
    if unrated_only {
        pairs.retain(ReviewPair::needs_rating);
    }

    match format {
        OutputFormat::Json => output::print_json(&pairs)?,
        OutputFormat::Text => print_pairs(&pairs),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_pairs(pairs: &[ReviewPair]) {
    if pairs.is_empty() {
        output::dimmed("Nothing to review");
        return;
    }

    for pair in pairs {
        output::section(&pair.key.to_string());
        let rating = pair
            .latest
            .rating
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unrated".yellow().to_string());
        output::key_value(
            "Latest",
            &format!("{} ({})", pair.latest.date.to_rfc3339(), rating),
        );
        println!("    {}", output::preview(&pair.latest.output, 160));

        match &pair.previous {
            Some(previous) => {
                output::key_value("Previous", &previous.date.to_rfc3339());
                println!("    {}", output::preview(&previous.output, 160));
            }
            None => output::dimmed("No previous record"),
        }
    }
    println!();
}
