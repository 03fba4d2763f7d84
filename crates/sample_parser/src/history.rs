//! Reader for historical datasets used by training.

use thiserror::Error;
use tracing::warn;
use vitals_structs::Sample;

use crate::{parse_number, parse_user_id};

/// Columns a historical dataset must provide.
const REQUIRED_COLUMNS: [&str; 5] = ["user_id", "hr", "rr", "in_room", "ts"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Dataset is empty")]
    Empty,

    #[error("Dataset header is missing column {0:?}")]
    MissingColumn(&'static str),
}

/// Rows read from a dataset, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryReport {
    pub samples: Vec<Sample>,
    /// Rows that were present but could not be parsed.
    pub skipped_rows: usize,
}

/// Column positions resolved from the header.
struct Columns {
    user_id: usize,
    hr: usize,
    rr: usize,
    in_room: usize,
    ts: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, HistoryError> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |column: &'static str| {
            names
                .iter()
                .position(|name| *name == column)
                .ok_or(HistoryError::MissingColumn(column))
        };

        let [user_id, hr, rr, in_room, ts] = REQUIRED_COLUMNS;
        Ok(Self {
            user_id: find(user_id)?,
            hr: find(hr)?,
            rr: find(rr)?,
            in_room: find(in_room)?,
            ts: find(ts)?,
        })
    }

    fn parse_row(&self, line: &str) -> Option<Sample> {
        let fields: Vec<&str> = line.split(',').collect();
        let field = |idx: usize| fields.get(idx).copied();

        Some(Sample {
            user_id: parse_user_id(field(self.user_id)?).ok()?,
            hr: parse_number("hr", field(self.hr)?).ok()?,
            rr: parse_number("rr", field(self.rr)?).ok()?,
            in_room: parse_presence(field(self.in_room)?)?,
            ts: field(self.ts)?.trim().to_string(),
        })
    }
}

/// Dataset exports write presence either as `0`/`1` or as booleans.
fn parse_presence(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "True" | "TRUE" => Some(true),
        "0" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Reads a header-led CSV dataset of historical samples.
///
/// Columns may appear in any order and extra columns are ignored. Malformed rows are
/// skipped and counted rather than failing the whole dataset. Blank lines are ignored.
///
/// # Errors
///
/// Returns an error if the dataset has no header or the header lacks a required column.
pub fn read_history(text: &str) -> Result<HistoryReport, HistoryError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header = lines.next().ok_or(HistoryError::Empty)?;
    let columns = Columns::from_header(header)?;

    let mut report = HistoryReport::default();
    for (idx, line) in lines.enumerate() {
        if let Some(sample) = columns.parse_row(line) {
            report.samples.push(sample);
        } else {
            warn!(row = idx + 1, line, "Skipping malformed dataset row");
            report.skipped_rows += 1;
        }
    }

    Ok(report)
}
