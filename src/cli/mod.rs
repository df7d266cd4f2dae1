//! Command-line parsing for the `kmacro` merge tool.
//!
//! Argument parsing and command dispatch stay separate from the pipeline code;
//! nothing in here touches data.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{ColumnNaming, Frequency, MergeMode, NativeFrequency, Tolerance};
use crate::normalize::parse_date_str;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "kmacro",
    version,
    about = "Normalize, merge and integrity-check Korean macro / real-estate time series"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load every source in a manifest, merge onto one date axis and check the result.
    Merge(MergeArgs),
    /// Re-derive raw source files and compare them against an existing merged CSV.
    Check(CheckArgs),
    /// Fetch one series from a provider and store it as a raw CSV.
    Fetch(FetchArgs),
}

/// Integrity tolerance flags, shared by `merge` and `check`.
#[derive(Debug, Args, Clone, Copy)]
pub struct ToleranceArgs {
    /// Allowed difference between expected and merged values.
    #[arg(long, default_value_t = 0.01)]
    pub tolerance: f64,

    /// Treat `--tolerance` as a fraction of the larger magnitude.
    #[arg(long)]
    pub relative: bool,
}

impl ToleranceArgs {
    pub fn tolerance(&self) -> Tolerance {
        if self.relative {
            Tolerance::Relative(self.tolerance)
        } else {
            Tolerance::Absolute(self.tolerance)
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct MergeArgs {
    /// JSON source manifest.
    pub manifest: PathBuf,

    /// Target frequency of the merged table.
    #[arg(short = 'f', long, value_enum, default_value_t = Frequency::Monthly)]
    pub frequency: Frequency,

    /// How the date range is chosen across series.
    #[arg(long, value_enum, default_value_t = MergeMode::Outer)]
    pub mode: MergeMode,

    /// Value column naming policy.
    #[arg(long, value_enum, default_value_t = ColumnNaming::SeriesName)]
    pub naming: ColumnNaming,

    /// First date of a fixed range (needs `--end`). Any supported date token.
    #[arg(long, value_parser = parse_cli_date, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last date of a fixed range (needs `--start`).
    #[arg(long, value_parser = parse_cli_date, requires = "start")]
    pub end: Option<NaiveDate>,

    #[command(flatten)]
    pub tolerance: ToleranceArgs,

    /// Skip calendar parts and percentage changes.
    #[arg(long)]
    pub no_features: bool,

    /// Add the ISO week column.
    #[arg(long)]
    pub week: bool,

    /// Add the day-of-week column (Monday = 0).
    #[arg(long)]
    pub day_of_week: bool,

    /// Add `is_month_end` and `is_quarter_end` flag columns.
    #[arg(long)]
    pub period_end: bool,

    /// Do not re-derive sources after merging.
    #[arg(long)]
    pub skip_integrity: bool,

    /// Write the merged table to CSV.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write the integrity report to JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct CheckArgs {
    /// Merged table CSV.
    pub table: PathBuf,

    /// Manifest listing the raw source files behind the table.
    pub manifest: PathBuf,

    /// Table frequency; inferred from the date column when omitted.
    #[arg(short = 'f', long, value_enum)]
    pub frequency: Option<Frequency>,

    /// Naming policy the table was written with.
    #[arg(long, value_enum, default_value_t = ColumnNaming::SeriesName)]
    pub naming: ColumnNaming,

    #[command(flatten)]
    pub tolerance: ToleranceArgs,

    /// Write the integrity report to JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FetchArgs {
    /// Provider name (`fred`, `ecos`).
    pub provider: String,

    /// Provider series identifier.
    pub series_id: String,

    #[arg(long, value_parser = parse_cli_date)]
    pub start: Option<NaiveDate>,

    #[arg(long, value_parser = parse_cli_date)]
    pub end: Option<NaiveDate>,

    /// Cadence to request.
    #[arg(long, value_enum)]
    pub hint: Option<NativeFrequency>,

    /// Raw CSV to write.
    #[arg(short = 'o', long)]
    pub output: PathBuf,
}

/// Accept the same date tokens as the normalizer (`2020-01-15`, `202001`, `2020Q1`, ...).
pub fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    parse_date_str(raw, None)
        .map(|p| p.date)
        .map_err(|e| e.to_string())
}
