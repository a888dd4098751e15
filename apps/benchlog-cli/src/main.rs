//! benchlog CLI
//!
//! Runs benchmark passes over the prompt catalog and reads back the
//! benchmark log for review.

mod commands;
mod output;
mod telemetry;

use benchlog_core::BenchConfig;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "benchlog",
    version,
    about = "Benchmark hosted language models and log output changes",
    long_about = "Sends every catalog prompt to every configured model and appends a\n\
                  record to the benchmark log only when a model's answer changed\n\
                  since the last recorded one."
)]
struct Cli {
    /// Configuration file (TOML); environment variables prefixed BENCHLOG_ override it
    #[arg(short, long, env = "BENCHLOG_CONFIG")]
    config: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "BENCHLOG_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "BENCHLOG_JSON_LOGS")]
    json_logs: bool,

    /// Output format (text, json)
    #[arg(
        short,
        long,
        default_value = "text",
        value_parser = ["text", "json"]
    )]
    format: String,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one benchmark pass over every prompt and model
    Run {
        /// Process distinct (model, prompt) pairs concurrently
        #[arg(short, long)]
        parallel: bool,

        /// Upper bound on in-flight pairs; implies --parallel
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Skip writing the run report files
        #[arg(long)]
        no_report: bool,
    },

    /// Show every record for one model and prompt, oldest first
    History {
        /// Model id
        #[arg(short, long)]
        model: String,

        /// Prompt id
        #[arg(short, long)]
        prompt: String,
    },

    /// Show the latest record and its predecessor for every key
    Review {
        /// Only keys whose latest record has no rating yet
        #[arg(long)]
        unrated: bool,
    },

    /// Attach a rating to one record
    Rate {
        /// Model id
        #[arg(short, long)]
        model: String,

        /// Prompt id
        #[arg(short, long)]
        prompt: String,

        /// Record date (RFC 3339)
        #[arg(short, long)]
        date: String,

        /// 0 = incorrect, 1 = correct, 2 = excellent
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
        rating: u8,
    },

    /// List the prompt catalog
    Prompts,

    /// List configured models with their resolved family
    Models,
}

fn load_config(path: Option<&str>) -> anyhow::Result<BenchConfig> {
    let config = match path {
        Some(path) => BenchConfig::load_from_file(path)?,
        None => BenchConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = telemetry::init_telemetry(&cli.log_level, cli.json_logs) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        return ExitCode::FAILURE;
    }

    let format: OutputFormat = match cli.format.parse() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            return ExitCode::from(commands::EXIT_CONFIGURATION);
        }
    };

    let result = match cli.command {
        Commands::Run {
            parallel,
            max_parallel,
            no_report,
        } => {
            commands::run::run(
                &config,
                commands::run::RunOptions {
                    parallel,
                    max_parallel,
                    no_report,
                },
                format,
            )
            .await
        }
        Commands::History { model, prompt } => {
            commands::history::run(&config, &model, &prompt, format).await
        }
        Commands::Review { unrated } => commands::review::run(&config, unrated, format).await,
        Commands::Rate {
            model,
            prompt,
            date,
            rating,
        } => commands::rate::run(&config, &model, &prompt, &date, rating, format).await,
        Commands::Prompts => commands::catalog::prompts(&config, format).await,
        Commands::Models => commands::catalog::models(&config, format),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
