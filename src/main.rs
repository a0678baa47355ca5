//! FitNesse Runner - parallel FitNesse suite execution
//!
//! Runs the pages of a FitNesse suite on a pool of FitNesse servers, one page
//! per server at a time, and merges the per-page JUnit results into a single
//! report.
//!
//! ## Features
//!
//! - Executor pool: every server runs one page at a time, pages are spread
//!   over all servers
//! - Retries for network calls, reruns for failing pages
//! - One JUnit report for the whole suite, saved to a directory or to Azure
//!   Blob Storage
//!
//! ## Usage
//!
//! ```bash
//! # Run a suite on 4 servers and save the report
//! fitnesse-runner run -t 'fitnesse-{0}.local:8080' -c 4 -s FrontPage.SuiteAcceptance -p ./reports
//!
//! # Upload the report to Azure Blob Storage
//! fitnesse-runner run -t 'fitnesse-{0}.local:8080' -c 4 -s FrontPage.SuiteAcceptance \
//!     -a myaccount -k "$STORAGE_KEY" -r test-results
//!
//! # List the pages of a suite
//! fitnesse-runner list -t 'fitnesse-{0}.local:8080' -c 1 -s FrontPage.SuiteAcceptance
//! ```

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod config;
mod error;
mod executor;
mod http;
mod models;
mod output;
mod results;
mod retry;
mod utils;

use cli::Args;
use config::{EnvConfig, RunnerConfig};
use error::RunnerError;
use executor::SuiteRunner;
use http::{FitnesseClient, WikiClient};
use models::Executor;
use output::{OutputFormat, ReportFormatter};
use results::{BlobStorage, BlobTarget, ReportTargets};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(LogLevel::from_flags(args.verbose, args.quiet));

    let result = match args.command {
        cli::Command::Run(run_args) => run_suite(run_args).await,
        cli::Command::List(list_args) => list_pages(list_args).await,
        cli::Command::Config(config_args) => manage_config(config_args),
    };

    if let Err(err) = result {
        match err.downcast_ref::<RunnerError>() {
            Some(runner_error) if runner_error.is_fatal() => {
                error!("run aborted: {runner_error}")
            }
            _ => error!("fatal: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run_suite(args: cli::RunArgs) -> Result<()> {
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow!("Unknown output format: {}", args.format))?;

    let mut config = RunnerConfig::resolve(args.config.as_deref())?;
    if let Some(secs) = args.pool_wait_timeout {
        config.pool_wait_timeout_secs = secs;
    }
    if let Some(retries) = args.failed_test_retries {
        config.failed_test_retries = retries;
    }
    if let Some(file_name) = &args.file_name {
        config.file_name = file_name.clone();
    }
    config.validate()?;

    // bad storage credentials fail before the suite runs, not after
    let targets = report_targets(&args, &config)?;

    let target = &args.target;
    let executors = Executor::from_template(&target.servers_template, target.servers_count)?;
    info!(
        "Running {} on {} servers: {}",
        target.suite,
        executors.len(),
        executors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let client: Arc<dyn WikiClient> =
        Arc::new(FitnesseClient::with_timeout(config.http_timeout_secs)?);
    let run = SuiteRunner::from_config(client, &config)
        .run(executors, &target.suite)
        .await?;

    let xml = run.report.to_xml()?;
    if !targets.save(&xml).await? {
        let mut formatter = ReportFormatter::new(format);
        if args.no_color {
            formatter = formatter.no_color();
        }
        let text = formatter.format_report(&run.report)?;
        println!("{text}");
    }

    info!("{}", ReportFormatter::format_brief(&run.report));
    Ok(())
}

fn report_targets(args: &cli::RunArgs, config: &RunnerConfig) -> Result<ReportTargets> {
    let blob = match (
        &args.storage_account,
        &args.storage_key,
        &args.storage_container,
    ) {
        (Some(account), Some(key), Some(container)) => {
            let mut storage = BlobStorage::new(account.as_str(), key)?;
            if let Some(endpoint) = &args.storage_endpoint {
                storage = storage.with_endpoint(endpoint.as_str());
            }
            Some(BlobTarget {
                storage,
                container: container.clone(),
            })
        }
        _ => None,
    };

    Ok(ReportTargets {
        results_dir: args.results_path.clone(),
        blob,
        file_name: config.file_name.clone(),
    })
}

async fn list_pages(args: cli::ListArgs) -> Result<()> {
    let config = RunnerConfig::resolve(args.config.as_deref())?;
    let target = &args.target;
    let executors = Executor::from_template(&target.servers_template, target.servers_count)?;

    let client: Arc<dyn WikiClient> =
        Arc::new(FitnesseClient::with_timeout(config.http_timeout_secs)?);
    let pages = SuiteRunner::from_config(client, &config)
        .discover(&executors, &target.suite)
        .await?;

    println!("\n{} ({} pages)\n", target.suite, pages.len());
    println!("──────────────────────────────────────────────────────────────────────");
    for page in &pages {
        println!("  {page}");
    }
    println!();

    Ok(())
}

fn manage_config(args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            RunnerConfig::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show {
            config,
            env,
            format,
        } => {
            if env {
                let env_config = EnvConfig::load();
                if env_config.has_any() {
                    env_config.print_summary();
                } else {
                    println!("No FITNESSE_RUNNER_* overrides set");
                }
                println!();
            }

            let config = RunnerConfig::resolve(config.as_deref())?;
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Validate { path } => match RunnerConfig::load(&path) {
            Ok(_) => {
                println!("✓ Configuration file is valid: {}", path.display());
            }
            Err(e) => {
                println!("✗ Configuration file is invalid: {}", path.display());
                println!("  Error: {e:#}");
                return Err(e);
            }
        },

        cli::ConfigAction::Env => {
            config::print_env_help();
            println!("\nConfig files, in order of precedence:");
            for location in config::CONFIG_LOCATIONS {
                println!("  {location}");
            }
            match config::find_config_file() {
                Some(path) => println!("\nUsing: {}", path.display()),
                None => println!("\nNo config file found, using defaults"),
            }
        }
    }

    Ok(())
}
