//! `benchlog prompts` and `benchlog models`

use anyhow::Result;
use benchlog_core::BenchConfig;
use benchlog_engine::resolve_models;
use colored::Colorize;
use serde_json::json;
use std::process::ExitCode;

use crate::output::{self, OutputFormat};

pub async fn prompts(config: &BenchConfig, format: OutputFormat) -> Result<ExitCode> {
    let stores = benchlog_store::open(config).await?;
    let prompts = stores.catalog.load_all().await?;

    match format {
        OutputFormat::Json => output::print_json(&prompts)?,
        OutputFormat::Text => {
            output::section(&format!("{} prompts in {}", prompts.len(), config.prompt_catalog));
            for prompt in &prompts {
                println!(
                    "{:<16} {:<10} {}",
                    prompt.id.bold(),
                    prompt.category().dimmed(),
                    output::preview(&prompt.prompt_text, 80)
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Lists configured models; any model without a known family fails the command
pub fn models(config: &BenchConfig, format: OutputFormat) -> Result<ExitCode> {
    let resolved = resolve_models(&config.model_ids());
    let unresolved = resolved.iter().filter(|(_, r)| r.is_err()).count();

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = resolved
                .iter()
                .map(|(model_id, resolved)| match resolved {
                    Ok(descriptor) => json!({"model_id": model_id, "family": descriptor.family}),
                    Err(e) => json!({"model_id": model_id, "error": e.to_string()}),
                })
                .collect();
            output::print_json(&rows)?;
        }
        OutputFormat::Text => {
            output::section("Configured models");
            for (model_id, resolved) in &resolved {
                match resolved {
                    Ok(descriptor) => output::key_value(model_id, descriptor.family.as_str()),
                    Err(e) => output::error(&format!("{}: {}", model_id, e)),
                }
            }
        }
    }

    Ok(if unresolved == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(super::EXIT_CONFIGURATION)
    })
}
