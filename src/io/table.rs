//! Merged table CSV read/write.
//!
//! Layout: `date` (ISO `YYYY-MM-DD`) first, then every column in table order.
//! Nulls are empty cells. Reading preserves row order and duplicate dates as
//! found so the integrity checker sees the file exactly as written.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::Frequency;
use crate::error::IngestError;
use crate::io::ingest::{clean_header_name, normalize_header_name};
use crate::merge::{Column, ColumnKind, MergedTable};
use crate::normalize::parse_value_str;
use crate::resample::infer_native_frequency;

const DATE_COLUMN: &str = "date";

pub fn write_table_csv(path: &Path, table: &MergedTable) -> Result<(), IngestError> {
    let file = File::create(path).map_err(|e| IngestError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_table(file, table).map_err(|message| IngestError::Write {
        path: path.to_path_buf(),
        message,
    })
}

pub fn write_table<W: Write>(writer: W, table: &MergedTable) -> Result<(), String> {
    let mut w = csv::Writer::from_writer(writer);

    let mut header = vec![DATE_COLUMN.to_string()];
    header.extend(table.columns.iter().map(|c| c.name.clone()));
    w.write_record(&header).map_err(|e| e.to_string())?;

    for (i, date) in table.dates.iter().enumerate() {
        let mut row = Vec::with_capacity(table.columns.len() + 1);
        row.push(date.format("%Y-%m-%d").to_string());
        for col in &table.columns {
            row.push(format_cell(col.kind, col.values.get(i).copied().flatten()));
        }
        w.write_record(&row).map_err(|e| e.to_string())?;
    }
    w.flush().map_err(|e| e.to_string())
}

fn format_cell(kind: ColumnKind, value: Option<f64>) -> String {
    match (kind, value) {
        (_, None) => String::new(),
        (ColumnKind::Calendar, Some(v)) => format!("{v:.0}"),
        (_, Some(v)) => v.to_string(),
    }
}

/// Read a merged table back. `frequency = None` infers it from the dates
/// (monthly when there are too few to tell).
pub fn read_table_csv(path: &Path, frequency: Option<Frequency>) -> Result<MergedTable, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_table(file, path, frequency)
}

pub fn read_table<R: Read>(reader: R, path: &Path, frequency: Option<Frequency>) -> Result<MergedTable, IngestError> {
    let csv_error = |message: String| IngestError::Csv {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().map_err(|e| csv_error(e.to_string()))?.clone();

    let date_idx = headers
        .iter()
        .position(|h| normalize_header_name(h) == DATE_COLUMN)
        .ok_or_else(|| IngestError::MissingColumn {
            path: path.to_path_buf(),
            column: DATE_COLUMN.to_string(),
        })?;
    let value_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .map(|(i, h)| (i, clean_header_name(h)))
        .collect();

    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); value_cols.len()];

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let row = result.map_err(|e| csv_error(format!("line {line}: {e}")))?;

        let raw_date = row.get(date_idx).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| csv_error(format!("line {line}: invalid date '{raw_date}'")))?;
        dates.push(date);

        for (slot, (col_idx, name)) in values.iter_mut().zip(&value_cols) {
            let cell = row.get(*col_idx).unwrap_or_default();
            let v = parse_value_str(cell).map_err(|e| csv_error(format!("line {line}, column `{name}`: {e}")))?;
            slot.push(v);
        }
    }

    let frequency = frequency
        .or_else(|| infer_native_frequency(&dates).as_frequency())
        .unwrap_or(Frequency::Monthly);

    let mut table = MergedTable::new(frequency, dates);
    for ((_, name), col_values) in value_cols.into_iter().zip(values) {
        let kind = ColumnKind::infer(&name);
        // Duplicate headers in a hand-edited file surface as a collision.
        table
            .add_column(Column::new(name, kind, col_values))
            .map_err(|e| csv_error(e.to_string()))?;
    }
    Ok(table)
}
