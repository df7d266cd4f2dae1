//! Shared "merge pipeline" logic used by the CLI commands.
//!
//! load/fetch -> normalize -> resample -> merge -> features -> integrity
//!
//! Every stage hands back an explicit value; the per-source diagnostics travel
//! in `RunOutput` rather than in any process-wide state.

use std::path::PathBuf;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::config::{PipelineConfig, SourceEntry, SourceManifest};
use crate::data::{FetchRequest, ProviderRegistry};
use crate::domain::{Aggregation, NativeFrequency, ProviderSchema, RawRecord, SeriesFrame};
use crate::error::AppError;
use crate::features::add_derived_features;
use crate::integrity::{IntegrityChecker, IntegrityReport, IntegritySource};
use crate::io::read_source_csv;
use crate::merge::{MergeOptions, MergedTable, SeriesMerger, column_name};
use crate::normalize::DateNormalizer;
use crate::resample::Resampler;

/// Offending date tokens kept per source for display.
const DROPPED_SAMPLE: usize = 5;

/// Raw records of one source, ready for normalization.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub name: String,
    pub source: String,
    /// Raw file on disk, if any; only these are re-checked for integrity.
    pub path: Option<PathBuf>,
    pub schema: ProviderSchema,
    pub records: Vec<RawRecord>,
    pub aggregation: Aggregation,
    pub hint: Option<NativeFrequency>,
    pub rows_read: usize,
    pub row_errors: usize,
}

impl LoadedSource {
    pub fn from_records(
        name: impl Into<String>,
        source: impl Into<String>,
        schema: ProviderSchema,
        records: Vec<RawRecord>,
    ) -> Self {
        let rows_read = records.len();
        Self {
            name: name.into(),
            source: source.into(),
            path: None,
            schema,
            records,
            aggregation: Aggregation::default(),
            hint: None,
            rows_read,
            row_errors: 0,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_hint(mut self, hint: Option<NativeFrequency>) -> Self {
        self.hint = hint;
        self
    }
}

/// What happened to one source on its way into the table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDiagnostics {
    pub name: String,
    pub source: String,
    pub column: String,
    pub rows_read: usize,
    pub row_errors: usize,
    pub dropped_dates: usize,
    /// First few offending date tokens.
    pub dropped_samples: Vec<String>,
    pub values_nulled: usize,
    pub native_frequency: NativeFrequency,
    /// Rows after resampling (including nulls).
    pub observations: usize,
    pub valid_observations: usize,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: MergedTable,
    pub diagnostics: Vec<SourceDiagnostics>,
    pub integrity: Option<IntegrityReport>,
}

/// Load every manifest entry: files from disk, series from providers.
pub fn load_sources(
    manifest: &SourceManifest,
    registry: &ProviderRegistry,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<LoadedSource>, AppError> {
    manifest
        .sources
        .iter()
        .map(|entry| load_source(entry, registry, range))
        .collect()
}

fn load_source(
    entry: &SourceEntry,
    registry: &ProviderRegistry,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<LoadedSource, AppError> {
    let mut loaded = match (&entry.path, &entry.provider, &entry.series_id) {
        (Some(path), _, _) => {
            let file = read_source_csv(path, entry.schema.as_ref())?;
            for err in file.row_errors.iter().take(DROPPED_SAMPLE) {
                log::warn!("{}: line {}: {}", path.display(), err.line, err.message);
            }
            let mut loaded = LoadedSource::from_records(&entry.name, entry.source_id(), file.schema, file.records)
                .with_path(path);
            loaded.rows_read = file.rows_read;
            loaded.row_errors = file.row_errors.len();
            loaded
        }
        (None, Some(provider), Some(series_id)) => {
            let provider = registry.get(provider)?;
            let request = FetchRequest::new(series_id)
                .with_range(range.map(|r| r.0), range.map(|r| r.1))
                .with_hint(entry.hint);
            let records = provider.fetch(&request)?;
            LoadedSource::from_records(&entry.name, entry.source_id(), provider.schema(), records)
        }
        _ => {
            return Err(AppError::new(
                2,
                format!("Source '{}' needs `path` or `provider` + `series_id`.", entry.name),
            ));
        }
    };
    loaded.aggregation = entry.aggregation;
    loaded.hint = entry.hint;

    log::info!(
        "loaded '{}' from {} ({} records)",
        loaded.name,
        loaded.source,
        loaded.records.len()
    );
    Ok(loaded)
}

/// Normalize and resample one source onto the target grid.
pub fn prepare_source(source: &LoadedSource, config: &PipelineConfig) -> (SeriesFrame, SourceDiagnostics) {
    let outcome = DateNormalizer::new().with_hint(source.hint).normalize(&source.records);
    let dropped_dates = outcome.dropped_count();
    let values_nulled = outcome.nulled_count();
    let dropped_samples: Vec<String> = outcome
        .dropped
        .iter()
        .take(DROPPED_SAMPLE)
        .map(|e| e.token.clone())
        .collect();

    if dropped_dates > 0 {
        log::warn!(
            "'{}': dropped {dropped_dates} rows with unparseable dates (e.g. {:?})",
            source.name,
            dropped_samples
        );
    }
    if values_nulled > 0 {
        log::warn!("'{}': {values_nulled} non-numeric values stored as null", source.name);
    }

    let frame = outcome.into_frame(source.name.clone(), source.source.clone());
    let resampled = Resampler::new(config.frequency)
        .with_aggregation(source.aggregation)
        .resample(&frame);

    let diagnostics = SourceDiagnostics {
        name: source.name.clone(),
        source: source.source.clone(),
        column: column_name(&resampled, config.naming),
        rows_read: source.rows_read,
        row_errors: source.row_errors,
        dropped_dates,
        dropped_samples,
        values_nulled,
        native_frequency: resampled.native_frequency,
        observations: resampled.len(),
        valid_observations: resampled.valid_count(),
    };
    (resampled, diagnostics)
}

/// Execute the full pipeline over already-loaded sources.
pub fn run(sources: &[LoadedSource], config: &PipelineConfig) -> Result<RunOutput, AppError> {
    if sources.is_empty() {
        return Err(AppError::new(3, "No sources to merge."));
    }

    // Sources are independent; only the merge needs them all.
    let prepared: Vec<(SeriesFrame, SourceDiagnostics)> =
        sources.par_iter().map(|s| prepare_source(s, config)).collect();
    let (frames, diagnostics): (Vec<SeriesFrame>, Vec<SourceDiagnostics>) = prepared.into_iter().unzip();

    if frames.iter().all(|f| f.valid_count() == 0) {
        return Err(AppError::new(3, "No usable observations in any source."));
    }

    let options = MergeOptions::new(config.frequency)
        .with_mode(config.mode)
        .with_naming(config.naming)
        .with_range(config.range);
    let mut table = SeriesMerger::new(options).merge(&frames)?;

    if config.derive_features {
        table = add_derived_features(&table, &config.features)?;
    }

    let integrity = config.run_integrity.then(|| {
        let checks = integrity_sources(sources, &diagnostics, &table);
        IntegrityChecker::new(config.tolerance).check(&table, &checks)
    });

    Ok(RunOutput {
        table,
        diagnostics,
        integrity,
    })
}

/// File-backed sources to re-derive, each restricted to the table's span so
/// a narrowed axis (inner merge, fixed range) is not mistaken for a shift.
fn integrity_sources(
    sources: &[LoadedSource],
    diagnostics: &[SourceDiagnostics],
    table: &MergedTable,
) -> Vec<IntegritySource> {
    let span = match (table.dates.first(), table.dates.last()) {
        (Some(&first), Some(&last)) => Some((first, last)),
        _ => None,
    };
    sources
        .iter()
        .zip(diagnostics)
        .filter_map(|(source, diag)| {
            let path = source.path.as_ref()?;
            Some(
                IntegritySource::new(source.name.clone(), path.clone())
                    .with_schema(Some(source.schema.clone()))
                    .with_column(diag.column.clone())
                    .with_hint(source.hint)
                    .with_aggregation(source.aggregation)
                    .with_range(span),
            )
        })
        .collect()
}
