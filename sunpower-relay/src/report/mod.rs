//! SunPower report loading
//!
//! A report is one exported file: one row per time interval, one column per
//! measured quantity, and a "Period" column describing the interval.

pub mod loader;
pub mod period;
pub mod value;

pub use loader::{LoadOptions, load_report};
pub use period::DEFAULT_TIMEZONE;
pub use value::CellValue;

use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One time interval of a loaded report
#[derive(Debug, Clone)]
pub struct ReportRow {
    period: Option<String>,
    timestamp: Option<DateTime<Tz>>,
    values: HashMap<String, CellValue>,
}

impl ReportRow {
    pub(crate) fn new(
        period: Option<String>,
        timestamp: Option<DateTime<Tz>>,
        values: HashMap<String, CellValue>,
    ) -> Self {
        Self {
            period,
            timestamp,
            values,
        }
    }

    /// Raw period string as it appeared in the file
    pub fn period(&self) -> Option<&str> {
        self.period.as_deref()
    }

    /// Resolved absolute timestamp
    pub fn timestamp(&self) -> Option<&DateTime<Tz>> {
        self.timestamp.as_ref()
    }

    /// Resolved timestamp as whole Unix seconds (truncated)
    pub fn unix_timestamp(&self) -> Option<i64> {
        self.timestamp.as_ref().map(|ts| ts.timestamp())
    }

    /// Value of a column, only if the cell is present
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column).filter(|v| v.is_present())
    }
}

/// A loaded report file
#[derive(Debug, Clone)]
pub struct Report {
    path: PathBuf,
    columns: Vec<String>,
    rows: Vec<ReportRow>,
}

impl Report {
    pub(crate) fn new(path: PathBuf, columns: Vec<String>, rows: Vec<ReportRow>) -> Self {
        Self {
            path,
            columns,
            rows,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names in file order, followed by the derived timestamp column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
