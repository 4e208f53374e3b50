mod chords;
mod cli;
mod config;
mod report;
mod run;
mod telemetry;

use clap::Parser;
use log::LevelFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
    log::debug!("Debug logging enabled");

    if let Err(e) = run::run(&cli).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
