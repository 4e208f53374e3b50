//! Cell value representation for loaded reports

use calamine::Data;

/// A single cell in a report row
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Empty cell, error cell, or NaN
    Empty,
    /// Whole number
    Int(i64),
    /// Floating point measurement
    Float(f64),
    /// Free text
    Text(String),
    /// Boolean flag
    Bool(bool),
}

impl CellValue {
    /// Check if this cell carries a value
    pub fn is_present(&self) -> bool {
        !matches!(self, CellValue::Empty)
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            CellValue::Float(f) => Some(*f),
            CellValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Parse a raw text field
    ///
    /// Numbers stored as text are recognized so CSV and workbook inputs map to
    /// the same values.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_nan() {
                return CellValue::Empty;
            }
            return CellValue::Float(f);
        }

        match trimmed.to_lowercase().as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::from_text(s),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) if f.is_nan() => CellValue::Empty,
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            // Date cells keep their serial value; the Period column is handled separately
            Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::Text(s.clone()),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) => CellValue::Empty,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => write!(f, ""),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}
