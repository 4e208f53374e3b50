//! Run configuration
//!
//! Loaded once at startup from a JSON file and never mutated afterwards.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::chords::DeliveryConfig;

/// Maps a report column onto a CHORDS variable short name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VariableBinding {
    /// Column header in the SunPower report
    pub column_name: String,
    /// Variable short name on the CHORDS instrument
    pub short_name: String,
}

/// Everything a run needs to know about the destination instrument
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub instrument_id: String,
    pub api_email: String,
    pub api_key: String,
    /// CHORDS portal host or base URL
    pub chords_host: String,
    pub variables: Vec<VariableBinding>,
    /// Ask the portal to flag measurements as test data
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl RunConfig {
    /// Parse and check a configuration document
    pub fn from_json(content: &str) -> Result<Self> {
        let config: RunConfig =
            serde_json::from_str(content).context("Failed to parse configuration JSON")?;
        config.check_present()?;
        Ok(config)
    }

    /// Every identity field must be present and non-empty
    fn check_present(&self) -> Result<()> {
        let required = [
            ("instrument_id", &self.instrument_id),
            ("api_email", &self.api_email),
            ("api_key", &self.api_key),
            ("chords_host", &self.chords_host),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("Configuration field '{}' is empty", name);
            }
        }

        if self.variables.is_empty() {
            log::warn!("No variables configured; records will only carry timestamps");
        }

        Ok(())
    }
}

/// Load the run configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("Configuration file does not exist: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

    let config = RunConfig::from_json(&content)
        .with_context(|| format!("Invalid configuration file: {}", path.display()))?;

    log::debug!(
        "Loaded configuration for instrument {} with {} variables",
        config.instrument_id,
        config.variables.len()
    );

    Ok(config)
}
