//! Read report files into rows with resolved timestamps
//!
//! Workbooks (xlsx, xlsm, xls, xlsb, ods) are read from their first worksheet.
//! CSV exports are accepted as well. The first row is the header row.

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use log::{debug, error, info, log_enabled};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::period::{DEFAULT_TIMEZONE, resolve_period};
use super::{CellValue, Report, ReportRow};

/// Column holding the interval description
pub const PERIOD_COLUMN: &str = "Period";

/// Derived column holding the resolved timestamp
pub const TIMESTAMP_COLUMN: &str = "Unix Timestamp";

/// Year and zone used to resolve period strings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Applied to interval strings that omit the year
    pub year: i32,
    /// Attached to periods without explicit zone information
    pub timezone: Tz,
}

impl Default for LoadOptions {
    /// Current local year (evaluated on every call) and US/Pacific
    fn default() -> Self {
        Self {
            year: Local::now().year(),
            timezone: DEFAULT_TIMEZONE,
        }
    }
}

/// Why a report could not be loaded
#[derive(Debug)]
pub enum LoadError {
    /// The path does not exist
    NotFound { path: PathBuf },
    /// The file could not be decoded as a table
    Parse { path: PathBuf, message: String },
    /// The table lacks a required column
    Schema { path: PathBuf, column: &'static str },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::NotFound { path } => write!(f, "{} does not exist", path.display()),
            LoadError::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            LoadError::Schema { path, column } => write!(
                f,
                "{} does not contain a {} column, can not parse",
                path.display(),
                column
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// Load a report file and resolve the timestamp of every row
pub fn load_report<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Report, LoadError> {
    let path = path.as_ref();

    if !path.exists() {
        let err = LoadError::NotFound {
            path: path.to_path_buf(),
        };
        error!("{}", err);
        return Err(err);
    }

    info!("Parsing {}", path.display());

    let table = read_table(path).map_err(|e| {
        let err = LoadError::Parse {
            path: path.to_path_buf(),
            message: format!("{:#}", e),
        };
        error!("{}", err);
        err
    })?;

    let Some((header_row, data_rows)) = table.split_first() else {
        let err = LoadError::Parse {
            path: path.to_path_buf(),
            message: "file has no header row".to_string(),
        };
        error!("{}", err);
        return Err(err);
    };

    let headers: Vec<String> = header_row.iter().map(header_name).collect();

    let Some(period_col) = headers.iter().position(|h| h == PERIOD_COLUMN) else {
        let err = LoadError::Schema {
            path: path.to_path_buf(),
            column: PERIOD_COLUMN,
        };
        error!("{}", err);
        return Err(err);
    };

    let mut rows = Vec::new();
    for raw in data_rows {
        // Skip blank rows
        if raw.iter().all(|cell| !CellValue::from(cell).is_present()) {
            continue;
        }

        let mut values = HashMap::new();
        for (col_idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = raw.get(col_idx).map(CellValue::from).unwrap_or(CellValue::Empty);
            values.insert(header.clone(), value);
        }

        let period = raw.get(period_col).and_then(period_text);
        let timestamp = period
            .as_deref()
            .map(|p| resolve_period(p, options.year, options.timezone));

        if let Some(ts) = &timestamp {
            values.insert(
                TIMESTAMP_COLUMN.to_string(),
                CellValue::Float(ts.timestamp_micros() as f64 / 1_000_000.0),
            );
        }

        rows.push(ReportRow::new(period, timestamp, values));
    }

    let mut columns: Vec<String> = headers.into_iter().filter(|h| !h.is_empty()).collect();
    columns.push(TIMESTAMP_COLUMN.to_string());

    if log_enabled!(log::Level::Debug) {
        debug!("Columns in {}: {:?}", path.display(), columns);
        for (i, row) in rows.iter().enumerate() {
            debug!("Row {}: {:?}", i, row);
        }
    }

    Ok(Report::new(path.to_path_buf(), columns, rows))
}

/// Read the raw cell grid, header row included
fn read_table(path: &Path) -> Result<Vec<Vec<Data>>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        read_csv(path)
    } else {
        read_workbook(path)
    }
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<Data>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("Workbook has no worksheets")?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    Ok(range.rows().map(|r| r.to_vec()).collect())
}

fn read_csv(path: &Path) -> Result<Vec<Vec<Data>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV record {}", line + 1))?;
        rows.push(record.iter().map(|field| Data::String(field.to_string())).collect());
    }

    Ok(rows)
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Text of a Period cell; date cells become ISO strings
fn period_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::DateTime(dt) => {
            excel_serial_to_naive(dt.as_f64()).map(|naive| naive.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Excel serial date (1900 system) to wall-clock time
fn excel_serial_to_naive(serial: f64) -> Option<NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(Duration::milliseconds(millis))
}
