//! `benchlog run`

use anyhow::Result;
use benchlog_adapters::{HttpModelInvoker, ModelInvoker};
use benchlog_core::BenchConfig;
use benchlog_engine::{ReportIo, RunCompletion, RunOrchestrator, RunReport, RunSettings, RunStatus};
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use super::EXIT_PARTIAL_FAILURE;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub parallel: bool,
    pub max_parallel: Option<usize>,
    pub no_report: bool,
}

impl RunOptions {
    fn apply(&self, settings: RunSettings) -> RunSettings {
        match self.max_parallel {
            Some(n) => settings.with_parallel(n),
            None if self.parallel => {
                let n = settings.max_parallel;
                settings.with_parallel(n)
            }
            None => settings,
        }
    }
}

pub async fn run(config: &BenchConfig, options: RunOptions, format: OutputFormat) -> Result<ExitCode> {
    let settings = options.apply(RunSettings::from_config(config)?);
    let stores = benchlog_store::open(config).await?;
    let invoker: Arc<dyn ModelInvoker> = Arc::new(HttpModelInvoker::from_config(&config.endpoint)?);

    if format == OutputFormat::Text {
        println!("{}", "Running benchmark pass...".cyan().bold());
        if settings.parallel {
            println!("Mode: {} (max {})", "parallel".green(), settings.max_parallel);
        }
    }

    let orchestrator = RunOrchestrator::new(stores.catalog, stores.log, invoker, settings);
    let report = match orchestrator.run().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, error_kind = %e.kind(), "Benchmark run aborted");
            let completion = RunCompletion::aborted(format!("Benchmark run aborted: {}", e));
            print_completion(&completion, format)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    if config.run.write_report && !options.no_report {
        let io = ReportIo::new(&config.run.report_dir);
        match io.write_report(&report) {
            Ok(written) => info!(
                run = %written.run.display(),
                summary = %written.summary.display(),
                "Run report written"
            ),
            // report files are best effort
            Err(e) => error!(error = %e, dir = %io.output_dir().display(), "Failed to write run report"),
        }
    }

    if format == OutputFormat::Text {
        print_report(&report);
    }
    print_completion(&report.completion(), format)?;

    Ok(ExitCode::from(exit_status(report.status)))
}

fn exit_status(status: RunStatus) -> u8 {
    match status {
        RunStatus::Success => 0,
        RunStatus::PartialFailure => EXIT_PARTIAL_FAILURE,
        RunStatus::Failure => 1,
    }
}

fn print_report(report: &RunReport) {
    output::section("Run");
    output::key_value("Run ID", &report.run_id.to_string());
    output::key_value(
        "Duration",
        &output::format_duration(report.duration_ms().max(0) as u64),
    );
    output::key_value("Pairs", &report.totals.pairs.to_string());
    output::key_value("Persisted", &report.totals.persisted.to_string().green().to_string());
    output::key_value("Unchanged", &report.totals.unchanged.to_string());
    output::key_value("Failed", &report.totals.failed.to_string());

    if !report.failures.is_empty() {
        output::section("Failures");
        for failure in &report.failures {
            output::error(&format!(
                "{} / {} [{}] {}",
                failure.model_id, failure.prompt_id, failure.kind, failure.message
            ));
        }
    }
    println!();
}

fn print_completion(completion: &RunCompletion, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => output::print_json(completion),
        OutputFormat::Text => {
            if completion.status == 200 {
                output::success(&completion.message);
            } else {
                output::warning(&completion.message);
            }
            Ok(())
        }
    }
}
