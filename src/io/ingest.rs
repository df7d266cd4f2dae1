//! Source CSV ingest.
//!
//! Turns a provider export (ECOS, KOSIS, FRED or a custom layout) into
//! `RawRecord`s. No parsing of dates or values happens here; that is the
//! normalizer's job, so the same records feed both the pipeline and the
//! integrity checker's independent re-derivation.
//!
//! - the date/value columns come from a `ProviderSchema` (explicit or detected)
//! - every other non-empty column is kept as a provider tag
//! - row-level CSV errors are collected, not fatal

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::domain::{ProviderSchema, RawRecord, RawToken};
use crate::error::IngestError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: raw records + resolved schema + row errors.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub schema: ProviderSchema,
    pub records: Vec<RawRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Read a source CSV. `schema = None` detects it from the header row.
pub fn read_source_csv(path: &Path, schema: Option<&ProviderSchema>) -> Result<SourceFile, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_source(file, path, schema)
}

/// Same as `read_source_csv`, from any reader. `path` is only used in errors.
pub fn read_source<R: Read>(
    reader: R,
    path: &Path,
    schema: Option<&ProviderSchema>,
) -> Result<SourceFile, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .clone();
    let header_names: Vec<String> = headers.iter().map(clean_header_name).collect();
    let header_map = build_header_map(&headers);

    let schema = match schema {
        Some(s) => s.clone(),
        None => ProviderSchema::detect(&header_names).ok_or_else(|| IngestError::UnknownSchema {
            path: path.to_path_buf(),
            headers: header_names.join(", "),
        })?,
    };

    let date_idx = column_index(&header_map, schema.date_column(), path)?;
    let value_idx = column_index(&header_map, schema.value_column(), path)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, plus the header row.
        let line = idx + 2;
        rows_read += 1;

        let row = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let mut record = RawRecord::new(cell(&row, date_idx), cell(&row, value_idx));
        for (i, name) in header_names.iter().enumerate() {
            if i == date_idx || i == value_idx {
                continue;
            }
            if let Some(v) = row.get(i).filter(|s| !s.is_empty()) {
                record.provider_tags.insert(name.clone(), v.to_string());
            }
        }
        records.push(record);
    }

    log::debug!(
        "read {} rows ({} errors) from '{}' as {}",
        rows_read,
        row_errors.len(),
        path.display(),
        schema.label()
    );

    Ok(SourceFile {
        path: path.to_path_buf(),
        schema,
        records,
        row_errors,
        rows_read,
    })
}

fn cell(row: &StringRecord, idx: usize) -> RawToken {
    match row.get(idx) {
        Some(s) if !s.is_empty() => RawToken::Text(s.to_string()),
        _ => RawToken::Missing,
    }
}

fn column_index(header_map: &HashMap<String, usize>, name: &str, path: &Path) -> Result<usize, IngestError> {
    header_map
        .get(&name.to_ascii_lowercase())
        .copied()
        .ok_or_else(|| IngestError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

/// Header as written, minus whitespace and a UTF-8 BOM.
pub(crate) fn clean_header_name(name: &str) -> String {
    // Excel-produced CSVs often carry a BOM on the first header ("\u{feff}TIME").
    name.trim().trim_start_matches('\u{feff}').to_string()
}

pub(crate) fn normalize_header_name(name: &str) -> String {
    clean_header_name(name).to_ascii_lowercase()
}
