//! Command line interface

use chrono_tz::Tz;
use clap::Parser;
use std::path::PathBuf;

use crate::report::{DEFAULT_TIMEZONE, LoadOptions};

/// Relay SunPower production reports to a CHORDS portal
#[derive(Parser, Debug, Clone)]
#[command(name = "sunpower-relay", version, about)]
pub struct Cli {
    /// SunPower report files (xlsx, xls, xlsb, ods or csv)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// JSON configuration with instrument, credentials and variable bindings
    #[arg(short, long)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Year for periods that omit it [default: current year]
    #[arg(long)]
    pub year: Option<i32>,

    /// Time zone the report periods are expressed in
    #[arg(long, default_value = "US/Pacific", value_parser = parse_timezone)]
    pub timezone: Tz,

    /// Print the ingest URIs instead of submitting them
    #[arg(long)]
    pub dry: bool,
}

impl Cli {
    /// Year and zone overrides, falling back to the loader defaults
    pub fn load_options(&self) -> LoadOptions {
        let defaults = LoadOptions::default();
        LoadOptions {
            year: self.year.unwrap_or(defaults.year),
            timezone: self.timezone,
        }
    }
}

fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.parse::<Tz>()
        .map_err(|_| format!("unknown time zone '{}' (default is {})", name, DEFAULT_TIMEZONE))
}
