//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads or fetches the sources named in a manifest
//! - runs the merge pipeline and the integrity checker
//! - prints summaries and writes optional exports

use clap::Parser;

use crate::cli::{CheckArgs, Command, FetchArgs, MergeArgs};
use crate::config::{PipelineConfig, SourceManifest, load_manifest};
use crate::data::{FetchRequest, ProviderRegistry};
use crate::domain::ColumnNaming;
use crate::error::AppError;
use crate::features::FeatureOptions;
use crate::integrity::{IntegrityChecker, IntegrityReport, IntegritySource};

pub mod pipeline;

/// Entry point for the `kmacro` binary.
pub fn run() -> Result<(), AppError> {
    // `kmacro sources.json` is shorthand for `kmacro merge sources.json`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Merge(args) => handle_merge(args),
        Command::Check(args) => handle_check(args),
        Command::Fetch(args) => handle_fetch(args),
    }
}

fn handle_merge(args: MergeArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args);
    let manifest = load_manifest(&args.manifest)?;
    let registry = ProviderRegistry::from_env();

    let sources = pipeline::load_sources(&manifest, &registry, config.range)?;
    let run = pipeline::run(&sources, &config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));

    if let Some(path) = &args.output {
        crate::io::write_table_csv(path, &run.table)?;
        log::info!("wrote {} rows to {}", run.table.len(), path.display());
    }

    match &run.integrity {
        Some(report) => finish_integrity(report, args.report.as_deref()),
        None => {
            if args.report.is_some() {
                log::warn!("--report ignored: integrity check skipped");
            }
            Ok(())
        }
    }
}

fn handle_check(args: CheckArgs) -> Result<(), AppError> {
    let table = crate::io::read_table_csv(&args.table, args.frequency)?;
    let manifest = load_manifest(&args.manifest)?;

    let span = table.dates.first().copied().zip(table.dates.last().copied());
    let sources: Vec<IntegritySource> = integrity_sources_from_manifest(&manifest, args.naming)
        .into_iter()
        .map(|s| s.with_range(span))
        .collect();

    let report = IntegrityChecker::new(args.tolerance.tolerance()).check(&table, &sources);
    finish_integrity(&report, args.report.as_deref())
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let registry = ProviderRegistry::from_env();
    let provider = registry.get(&args.provider)?;

    let request = FetchRequest::new(&args.series_id)
        .with_range(args.start, args.end)
        .with_hint(args.hint);
    let records = provider.fetch(&request)?;
    if records.is_empty() {
        return Err(AppError::new(
            3,
            format!("{} returned no observations for '{}'.", provider.name(), args.series_id),
        ));
    }

    crate::io::write_records_csv(&args.output, &provider.schema(), &records)?;
    println!(
        "Wrote {} records of '{}' ({}) to {}",
        records.len(),
        args.series_id,
        provider.name(),
        args.output.display()
    );
    Ok(())
}

/// Print the report, write it if asked, and turn a failed verdict into exit code 5.
fn finish_integrity(report: &IntegrityReport, json_path: Option<&std::path::Path>) -> Result<(), AppError> {
    println!("{}", crate::report::format_integrity_report(report));

    if let Some(path) = json_path {
        crate::io::write_report_json(path, report)?;
    }

    if report.verdict().passed() {
        Ok(())
    } else {
        Err(AppError::new(
            5,
            format!(
                "Integrity check failed with {} critical finding(s).",
                report.critical_count()
            ),
        ))
    }
}

/// File-backed manifest entries as integrity sources. Provider entries have no
/// raw file to re-read and are skipped.
pub fn integrity_sources_from_manifest(manifest: &SourceManifest, naming: ColumnNaming) -> Vec<IntegritySource> {
    manifest
        .sources
        .iter()
        .filter_map(|entry| {
            let Some(path) = &entry.path else {
                log::warn!("integrity: '{}' has no raw file, skipped", entry.name);
                return None;
            };
            let column = match naming {
                ColumnNaming::SeriesName => format!("{}_value", entry.name),
                ColumnNaming::SourceQualified => format!("{}_{}_value", entry.source_id(), entry.name),
            };
            Some(
                IntegritySource::new(entry.name.clone(), path.clone())
                    .with_schema(entry.schema.clone())
                    .with_column(column)
                    .with_hint(entry.hint)
                    .with_aggregation(entry.aggregation),
            )
        })
        .collect()
}

pub fn pipeline_config_from_args(args: &MergeArgs) -> PipelineConfig {
    PipelineConfig {
        frequency: args.frequency,
        mode: args.mode,
        naming: args.naming,
        range: args.start.zip(args.end),
        derive_features: !args.no_features,
        features: FeatureOptions {
            include_week: args.week,
            include_day_of_week: args.day_of_week,
            include_period_end: args.period_end,
        },
        tolerance: args.tolerance.tolerance(),
        run_integrity: !args.skip_integrity,
    }
}

/// Rewrite argv so a bare manifest path means `merge`.
///
/// Rules:
/// - `kmacro sources.json ...`      -> `kmacro merge sources.json ...`
/// - `kmacro --help/--version/-h`   -> unchanged
/// - `kmacro <subcommand> ...`      -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "merge" | "check" | "fetch");
    if is_subcommand {
        return argv;
    }

    if arg1.ends_with(".json") {
        argv.insert(1, "merge".to_string());
    }
    argv
}
