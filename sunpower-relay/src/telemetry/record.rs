//! Row to telemetry record mapping

use log::{debug, warn};

use crate::config::{RunConfig, VariableBinding};
use crate::report::{CellValue, Report, ReportRow};

/// Reserved variable name carrying the measurement time
pub const AT_KEY: &str = "at";

/// One named value of a telemetry record
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: CellValue,
}

/// One outbound data point for a CHORDS instrument
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub instrument_id: String,
    pub api_email: String,
    pub api_key: String,
    pub host: String,
    at: i64,
    measurements: Vec<Variable>,
}

impl TelemetryRecord {
    /// Start a record for `at` (Unix seconds) with the config's identity
    pub fn new(config: &RunConfig, at: i64) -> Self {
        Self {
            instrument_id: config.instrument_id.clone(),
            api_email: config.api_email.clone(),
            api_key: config.api_key.clone(),
            host: config.chords_host.clone(),
            at,
            measurements: Vec::new(),
        }
    }

    /// Measurement time in Unix seconds
    pub fn at(&self) -> i64 {
        self.at
    }

    /// Bound measurements, in configuration order (`at` excluded)
    pub fn measurements(&self) -> &[Variable] {
        &self.measurements
    }

    /// Look up a variable by short name, `at` included
    pub fn get(&self, name: &str) -> Option<CellValue> {
        if name == AT_KEY {
            return Some(CellValue::Int(self.at));
        }
        self.measurements
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.clone())
    }

    /// Number of variables including `at`
    pub fn variable_count(&self) -> usize {
        self.measurements.len() + 1
    }

    pub fn push(&mut self, name: impl Into<String>, value: CellValue) {
        self.measurements.push(Variable {
            name: name.into(),
            value,
        });
    }
}

/// Lazily turn every usable row of a report into a telemetry record
///
/// Rows without a period or a resolved timestamp are skipped. Bindings whose
/// column is absent from a row are left out of that row's record only.
pub fn map_records<'a>(
    report: &'a Report,
    config: &'a RunConfig,
) -> impl Iterator<Item = TelemetryRecord> + 'a {
    report
        .rows()
        .iter()
        .enumerate()
        .filter_map(move |(index, row)| map_row(index, row, config))
}

fn map_row(index: usize, row: &ReportRow, config: &RunConfig) -> Option<TelemetryRecord> {
    if row.period().is_none() {
        warn!("Skipping row {}: no period", index);
        return None;
    }

    let Some(at) = row.unix_timestamp() else {
        warn!("Skipping row {}: no resolved timestamp", index);
        return None;
    };

    let mut record = TelemetryRecord::new(config, at);
    for VariableBinding {
        column_name,
        short_name,
    } in &config.variables
    {
        match row.get(column_name) {
            Some(value) => record.push(short_name.clone(), value.clone()),
            None => debug!("Row {} has no value for '{}'", index, column_name),
        }
    }

    Some(record)
}
