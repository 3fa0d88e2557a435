//! Inline record blocks
//!
//! Weather streams, RAWS observations, wind records, burn periods and fuel
//! moistures are embedded in the inputs file as a `KEY: count` line followed
//! by `count` space-separated records. This module turns tabular data into
//! that block form.

use crate::error::{FireModelError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;

/// A single cell of a record table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// Integer cell (dates, times, percentages)
    Int(i64),
    /// Real-valued cell (precipitation, wind speed)
    Float(f64),
    /// Anything else, emitted verbatim
    Text(String),
}

impl RecordValue {
    /// Parse one token of a record file. Zero-padded integers such as the
    /// `08` of a date stay text so their padding survives.
    pub fn parse(token: &str) -> Self {
        let zero_padded = token.len() > 1 && token.starts_with('0') && token.bytes().all(|b| b.is_ascii_digit());
        if zero_padded {
            RecordValue::Text(token.to_string())
        } else if let Ok(v) = token.parse::<i64>() {
            RecordValue::Int(v)
        } else if let Ok(v) = token.parse::<f64>() {
            RecordValue::Float(v)
        } else {
            RecordValue::Text(token.to_string())
        }
    }

    /// Text that would break the one-record-per-line layout
    fn is_unprintable(&self) -> bool {
        match self {
            RecordValue::Text(t) => t.trim().is_empty() || t.contains(&['\n', '\r'][..]),
            _ => false,
        }
    }

    fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            RecordValue::Int(v) => Some(*v as f64),
            RecordValue::Float(v) => Some(*v),
            RecordValue::Text(t) => t.parse().ok(),
        }
    }

    /// Total order used for chronological sorting: numbers (padded or not)
    /// by value, then text lexicographically.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        if let (RecordValue::Int(a), RecordValue::Int(b)) = (self, other) {
            return a.cmp(b);
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Int(v) => write!(f, "{v}"),
            RecordValue::Float(v) => write!(f, "{v}"),
            RecordValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for RecordValue {
    fn from(v: i64) -> Self {
        RecordValue::Int(v)
    }
}

impl From<i32> for RecordValue {
    fn from(v: i32) -> Self {
        RecordValue::Int(i64::from(v))
    }
}

impl From<f64> for RecordValue {
    fn from(v: f64) -> Self {
        RecordValue::Float(v)
    }
}

impl From<&str> for RecordValue {
    fn from(v: &str) -> Self {
        RecordValue::Text(v.to_string())
    }
}

/// How rows are ordered before emission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    /// Sort ascending on the whole row tuple. Only meaningful when the
    /// leading columns are year/month/day/time in that order.
    Chronological,
    /// Keep the caller's row order (fuel moisture rows keyed by model index)
    AsGiven,
}

/// A validated table of equal-arity records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    rows: Vec<Vec<RecordValue>>,
}

impl RecordTable {
    /// Validate a table of rows.
    ///
    /// # Errors
    /// Returns [`FireModelError::MalformedTable`] if a row is empty, has a
    /// different arity than the first row, or contains a line break.
    pub fn new(rows: Vec<Vec<RecordValue>>) -> Result<Self> {
        let arity = rows.first().map_or(0, Vec::len);
        for (i, row) in rows.iter().enumerate() {
            if row.is_empty() {
                return Err(FireModelError::MalformedTable {
                    row: i,
                    message: "row has no fields".to_string(),
                });
            }
            if row.len() != arity {
                return Err(FireModelError::MalformedTable {
                    row: i,
                    message: format!("expected {arity} fields, found {}", row.len()),
                });
            }
            if row.iter().any(RecordValue::is_unprintable) {
                return Err(FireModelError::MalformedTable {
                    row: i,
                    message: "text field is blank or spans lines".to_string(),
                });
            }
        }
        Ok(Self { rows })
    }

    /// Parse a whitespace- or comma-delimited record file.
    ///
    /// Blank lines and `#` comments are skipped. The first row is taken as a
    /// header and dropped only when none of its cells is numeric and the row
    /// after it has the same arity; any other row is data.
    ///
    /// # Errors
    /// Returns [`FireModelError::MalformedTable`] if rows differ in arity.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut rows: Vec<Vec<RecordValue>> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                line.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|t| !t.is_empty())
                    .map(RecordValue::parse)
                    .collect()
            })
            .collect();
        let has_header = match rows.as_slice() {
            [first, second, ..] => {
                first.len() == second.len() && !first.iter().any(RecordValue::is_numeric)
            }
            _ => false,
        };
        if has_header {
            rows.remove(0);
        }
        Self::new(rows)
    }

    /// Read and parse a record file from disk.
    ///
    /// # Errors
    /// Returns [`FireModelError::SourceNotFound`] if the file is missing,
    /// [`FireModelError::SourceRead`] if it cannot be read, and
    /// [`FireModelError::MalformedTable`] if its rows differ in arity.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FireModelError::SourceNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|e| FireModelError::source_read(path, e))?;
        Self::from_text(&text)
    }

    /// Ensure a fuel model 0 row exists.
    ///
    /// The simulators use model 0 as the default moisture for fuel models
    /// without an explicit entry. If no row starts with 0, a copy of the
    /// first row with its model index replaced by 0 is prepended.
    pub fn with_default_fuel_model(mut self) -> Self {
        let has_default = self
            .rows
            .iter()
            .any(|row| row.first().and_then(RecordValue::as_f64) == Some(0.0));
        if has_default {
            return self;
        }
        if let Some(mut zero_row) = self.rows.first().cloned() {
            zero_row[0] = RecordValue::Int(0);
            self.rows.insert(0, zero_row);
        }
        self
    }

    /// Rows of the table
    pub fn rows(&self) -> &[Vec<RecordValue>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table as an inline block
    pub fn format(&self, order: RecordOrder) -> WeatherRecordBlock {
        let mut rows: Vec<&Vec<RecordValue>> = self.rows.iter().collect();
        if order == RecordOrder::Chronological {
            rows.sort_by(|a, b| {
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| x.sort_cmp(y))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        let lines = rows
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        WeatherRecordBlock { rows: lines }
    }
}

/// Validate and format a table in one step.
///
/// # Errors
/// Returns [`FireModelError::MalformedTable`] if the rows differ in arity.
pub fn format_records(rows: Vec<Vec<RecordValue>>, order: RecordOrder) -> Result<WeatherRecordBlock> {
    Ok(RecordTable::new(rows)?.format(order))
}

/// Formatted block: the record count plus one text line per record
///
/// The count is always derived from the stored lines, so `count() ==
/// rows().len()` holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct WeatherRecordBlock {
    rows: Vec<String>,
}

impl WeatherRecordBlock {
    /// Number of records
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Record lines in emission order
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Records joined by newlines, without a trailing newline
    pub fn text(&self) -> String {
        self.rows.join("\n")
    }
}

impl TryFrom<Vec<String>> for WeatherRecordBlock {
    type Error = FireModelError;

    fn try_from(lines: Vec<String>) -> Result<Self> {
        let rows = lines
            .iter()
            .map(|line| line.split_whitespace().map(RecordValue::parse).collect())
            .collect();
        RecordTable::new(rows)?;
        Ok(Self {
            rows: lines.into_iter().map(|l| l.trim().to_string()).collect(),
        })
    }
}

impl From<WeatherRecordBlock> for Vec<String> {
    fn from(block: WeatherRecordBlock) -> Self {
        block.rows
    }
}
