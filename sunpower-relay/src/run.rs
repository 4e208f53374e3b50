//! End-to-end run: load every report, relay its rows, wait for delivery

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::*;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

use crate::chords::{ChordsRelay, Delivery, redact};
use crate::cli::Cli;
use crate::config::{RunConfig, load_config};
use crate::report::{LoadOptions, load_report};
use crate::telemetry::{DispatchOptions, TelemetryDispatcher, map_records};

/// How often the pending count is checked while draining
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub dispatched: usize,
}

impl FileSummary {
    pub fn skipped(&self) -> usize {
        self.rows - self.dispatched
    }
}

/// Run the whole pipeline as described by the command line
pub async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let load_options = cli.load_options();
    info!(
        "Resolving periods with fallback year {} in {}",
        load_options.year, load_options.timezone
    );

    if cli.dry {
        let delivery = PrintDelivery;
        delivery.start()?;
        let dispatch = DispatchOptions {
            throttle: Duration::ZERO,
            test: config.test,
            ..DispatchOptions::default()
        };
        let summaries = process_files(&delivery, &cli.files, &config, &load_options, dispatch).await?;
        print_summary(&summaries);
        return Ok(());
    }

    let relay = ChordsRelay::open(&config.delivery).await?;
    relay.start()?;

    let dispatch = DispatchOptions {
        test: config.test,
        ..DispatchOptions::default()
    };
    let summaries = process_files(&relay, &cli.files, &config, &load_options, dispatch).await?;
    print_summary(&summaries);

    wait_for_drain(&relay, DRAIN_POLL_INTERVAL).await
}

/// Load, map and dispatch every file in order
///
/// The first file that fails to load aborts the run.
pub async fn process_files(
    delivery: &dyn Delivery,
    files: &[PathBuf],
    config: &RunConfig,
    load_options: &LoadOptions,
    dispatch: DispatchOptions,
) -> Result<Vec<FileSummary>> {
    let dispatcher = TelemetryDispatcher::new(delivery, dispatch);
    let mut summaries = Vec::with_capacity(files.len());

    for path in files {
        let summary = process_file(&dispatcher, path, config, load_options).await?;
        summaries.push(summary);
    }

    Ok(summaries)
}

async fn process_file(
    dispatcher: &TelemetryDispatcher<'_>,
    path: &Path,
    config: &RunConfig,
    load_options: &LoadOptions,
) -> Result<FileSummary> {
    let report = load_report(path, load_options)
        .with_context(|| format!("Aborting run: could not load {}", path.display()))?;

    if report.is_empty() {
        warn!("{} has no data rows", path.display());
    }

    let mut dispatched = 0;
    for record in map_records(&report, config) {
        dispatcher.dispatch(&record).await?;
        dispatched += 1;
    }

    info!(
        "Dispatched {} records from {} rows of {}",
        dispatched,
        report.len(),
        path.display()
    );

    Ok(FileSummary {
        path: path.to_path_buf(),
        rows: report.len(),
        dispatched,
    })
}

/// Block until the delivery queue is empty
pub async fn wait_for_drain(delivery: &dyn Delivery, interval: Duration) -> Result<()> {
    loop {
        let pending = delivery.pending_count().await?;
        if pending == 0 {
            info!("All submissions delivered");
            return Ok(());
        }

        info!("Waiting for {} submissions to be delivered", pending);
        sleep(interval).await;
    }
}

fn print_summary(summaries: &[FileSummary]) {
    for summary in summaries {
        let skipped = if summary.skipped() > 0 {
            format!(", {} skipped", summary.skipped()).yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{} {} records from {}{}",
            "Dispatched".bright_green(),
            summary.dispatched,
            summary.path.display().to_string().cyan(),
            skipped
        );
    }
}

/// Prints URIs instead of queueing them (`--dry`)
struct PrintDelivery;

#[async_trait]
impl Delivery for PrintDelivery {
    fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn submit(&self, uri: String, _max_queue_length: usize) -> Result<()> {
        println!("{}", redact(&uri).dimmed());
        Ok(())
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(0)
    }
}
