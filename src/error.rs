//! Error types.
//!
//! Library stages return typed errors (`MergeError`, `IngestError`); the binary
//! boundary converts everything into an exit-coded `AppError`.
//!
//! Exit codes:
//! - 2: bad input / configuration
//! - 3: no usable data
//! - 4: provider / network failure
//! - 5: integrity verdict `Failed`

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::{InitError, ProviderError};
use crate::domain::Frequency;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Hard failures of the merge stage. These abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("no series to merge")]
    NoSeries,

    #[error("column collision: '{column}' produced by both '{first}' and '{second}'")]
    ColumnCollision {
        column: String,
        first: String,
        second: String,
    },

    #[error("series '{series}' has date {date} not anchored to the {frequency} grid")]
    UnalignedDate {
        series: String,
        date: NaiveDate,
        frequency: Frequency,
    },

    #[error("series '{series}' has more than one observation at {date}")]
    DuplicateDate { series: String, date: NaiveDate },

    #[error("series '{series}' is not sorted by date (at {date})")]
    UnorderedSeries { series: String, date: NaiveDate },

    #[error("invalid merge range: {start} > {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("column '{column}' has {actual} rows, table has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// File store failures (source CSVs and merged tables).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV '{path}': {message}")]
    Csv { path: PathBuf, message: String },

    #[error("'{path}': missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: String },

    #[error("'{path}': could not detect provider schema from headers [{headers}]")]
    UnknownSchema { path: PathBuf, headers: String },

    #[error("failed to write '{path}': {message}")]
    Write { path: PathBuf, message: String },
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        let code = match err {
            MergeError::NoSeries => 3,
            _ => 2,
        };
        AppError::new(code, format!("Merge failed: {err}"))
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::new(4, err.to_string())
    }
}

impl From<InitError> for AppError {
    fn from(err: InitError) -> Self {
        AppError::new(2, err.to_string())
    }
}
