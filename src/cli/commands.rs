use crate::analyzers::ArrayAnalyzer;
use crate::cli::args::{Cli, Commands};
use crate::client::{BatchFetcher, Credentials, HttpTransport, RetryPolicy};
use crate::models::RunParams;
use crate::processors::{HarvestRequest, Harvester};
use crate::utils::progress::ProgressReporter;
use crate::writers::{DatasetReader, DatasetWriter};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Fetch {
            dataset,
            config,
            mode,
            square,
            source,
            output,
            wave_size,
            cooldown_secs,
            timeout_secs,
            max_retries,
            base_url,
            compression,
            dry_run,
        } => {
            let params = RunParams::load(&config)
                .with_context(|| format!("Failed to read parameters from {}", config.display()))?;

            let request = HarvestRequest {
                square,
                source,
                base_url,
                output,
                ..HarvestRequest::new(params, dataset, mode)
            };

            let plan = request.plan()?;

            if dry_run {
                println!("{} request(s) for {} data from {}:", plan.len(), dataset, source);
                for descriptor in &plan {
                    println!("{}", descriptor.url);
                }
                return Ok(());
            }

            println!("Fetching {} data from {}...", dataset, source);
            println!("Coordinates: {}", plan.len());
            println!("Output file: {}", request.output.display());

            let credentials = Credentials::from_env()
                .context("Set the 'token' and 'ocp' environment variables")?;
            debug!(?credentials, "Loaded credentials");

            let timeout = Duration::from_secs(timeout_secs);
            let transport = Arc::new(HttpTransport::new(&credentials, timeout)?);

            let fetcher = BatchFetcher::new(transport)
                .with_wave_size(wave_size)
                .with_cooldown(Duration::from_secs(cooldown_secs))
                .with_request_timeout(timeout)
                .with_retry_policy(RetryPolicy::exponential(max_retries));
            let writer = DatasetWriter::new().with_compression(&compression)?;
            let harvester = Harvester::new(fetcher, writer);

            let progress = ProgressReporter::new(plan.len() as u64, "Fetching...", false);
            let summary = harvester.run(&request, Some(&progress)).await;
            progress.finish_with_message("Requests complete");
            let summary = summary.with_context(|| {
                format!("Harvest into {} failed", request.output.display())
            })?;

            println!("\n{}", summary.summary());

            let info = DatasetReader::open(&request.output)?.info()?;
            println!("\n{}", info.summary());

            info!("Harvest complete");
        }

        Commands::Info { file, no_stats } => {
            println!("Analyzing dataset store: {}", file.display());

            let reader = DatasetReader::open(&file)
                .with_context(|| format!("Cannot open {}", file.display()))?;
            let info = reader.info()?;

            if !no_stats {
                let stats = ArrayAnalyzer::new().analyze_store(&file)?;
                println!("\n{}", stats.detailed_summary());
            }

            println!("\nFile Details:");
            println!("{}", info.summary());
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Cannot create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    if result.is_err() {
        debug!("Logging already initialised");
    }

    Ok(())
}
