use chrono::NaiveDate;

use kmacro::app::pipeline::{self, LoadedSource};
use kmacro::config::PipelineConfig;
use kmacro::domain::{
    ColumnNaming, Frequency, MergeMode, NativeFrequency, NormalizedObservation, ProviderSchema, RawRecord, SeriesFrame,
};
use kmacro::error::MergeError;
use kmacro::integrity::{FindingDetails, FindingKind, IntegrityChecker, IntegrityReport, Verdict};
use kmacro::merge::{Column, ColumnKind, MergeOptions, MergedTable, SeriesMerger};
use kmacro::normalize::DateNormalizer;
use kmacro::resample::Resampler;

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn merge_only(range: (NaiveDate, NaiveDate)) -> PipelineConfig {
    PipelineConfig {
        range: Some(range),
        derive_features: false,
        run_integrity: false,
        ..PipelineConfig::default()
    }
}

fn column(table: &MergedTable, name: &str) -> Vec<Option<f64>> {
    table.column(name).unwrap().values.clone()
}

#[test]
fn monthly_gap_becomes_null_not_shifted() {
    let source = LoadedSource::from_records(
        "hpi",
        "kb",
        ProviderSchema::Ecos,
        vec![
            RawRecord::new("202001", "100"),
            RawRecord::new("202002", "105"),
            RawRecord::new("202004", "110"),
        ],
    );

    let out = pipeline::run(&[source], &merge_only((d(2020, 1), d(2020, 4)))).unwrap();

    assert_eq!(out.table.dates, vec![d(2020, 1), d(2020, 2), d(2020, 3), d(2020, 4)]);
    assert_eq!(
        column(&out.table, "hpi_value"),
        vec![Some(100.0), Some(105.0), None, Some(110.0)]
    );
}

#[test]
fn quarterly_to_monthly_forward_fills_within_quarters() {
    let source = LoadedSource::from_records(
        "gdp",
        "bok",
        ProviderSchema::Ecos,
        vec![RawRecord::new("2020Q1", "50"), RawRecord::new("2020Q2", "55")],
    );

    let out = pipeline::run(&[source], &merge_only((d(2020, 1), d(2020, 6)))).unwrap();

    assert_eq!(out.diagnostics[0].native_frequency, NativeFrequency::Quarterly);
    assert_eq!(out.table.dates, (1..=6).map(|m| d(2020, m)).collect::<Vec<_>>());
    assert_eq!(
        column(&out.table, "gdp_value"),
        vec![Some(50.0), Some(50.0), Some(50.0), Some(55.0), Some(55.0), Some(55.0)]
    );
}

#[test]
fn same_series_name_from_two_sources_collides() {
    let frame = |source: &str, v: f64| {
        SeriesFrame::from_observations(
            "rate",
            source,
            vec![NormalizedObservation::new(d(2020, 1), Some(v), NativeFrequency::Monthly)],
        )
    };
    let frames = [frame("bok", 0.5), frame("fred", 1.75)];

    let err = SeriesMerger::new(MergeOptions::new(Frequency::Monthly))
        .merge(&frames)
        .unwrap_err();
    match err {
        MergeError::ColumnCollision { column, first, second } => {
            assert_eq!(column, "rate_value");
            assert_eq!(first, "bok/rate");
            assert_eq!(second, "fred/rate");
        }
        other => panic!("unexpected {other:?}"),
    }

    // Source-qualified names keep both.
    let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly).with_naming(ColumnNaming::SourceQualified))
        .merge(&frames)
        .unwrap();
    assert_eq!(table.column_names(), vec!["bok_rate_value", "fred_rate_value"]);
}

#[test]
fn collision_aborts_the_pipeline_with_input_error() {
    let src = |source: &str| {
        LoadedSource::from_records("rate", source, ProviderSchema::Fred, vec![RawRecord::new("2020-01-01", "1")])
    };
    let err = pipeline::run(&[src("a"), src("b")], &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn duplicated_row_fails_with_one_duplicate_finding() {
    let mut table = MergedTable::new(Frequency::Monthly, vec![d(2020, 1), d(2020, 2), d(2020, 2), d(2020, 3)]);
    table
        .add_column(Column::new(
            "cpi_value",
            ColumnKind::Value,
            vec![Some(1.0), Some(2.0), Some(2.0), Some(3.0)],
        ))
        .unwrap();

    let report = IntegrityChecker::default().check(&table, &[]);

    let duplicates: Vec<_> = report.findings_of(FindingKind::DuplicateDate).collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].details.count(), 1);
    assert_eq!(
        duplicates[0].details,
        FindingDetails::DuplicateDate {
            count: 1,
            dates: vec![d(2020, 2)],
        }
    );
    assert_eq!(report.verdict(), Verdict::Failed);
}

#[test]
fn series_advanced_by_one_period_is_reported_as_shift() {
    // Original series S, then a merged column holding S moved one month later.
    let values = [100.0, 101.5, 99.0, 104.0, 103.25, 108.0];
    let records: Vec<RawRecord> = values
        .iter()
        .enumerate()
        .map(|(i, v)| RawRecord::new(format!("2021{:02}", i + 1), v.to_string()))
        .collect();
    let frame = DateNormalizer::new().normalize(&records).into_frame("cpi", "bok");
    let expected = Resampler::new(Frequency::Monthly).resample(&frame);

    let shifted_dates: Vec<NaiveDate> = (2..=7).map(|m| d(2021, m)).collect();
    let mut table = MergedTable::new(Frequency::Monthly, shifted_dates);
    table
        .add_column(Column::new(
            "cpi_value",
            ColumnKind::Value,
            values.iter().map(|v| Some(*v)).collect(),
        ))
        .unwrap();

    let checker = IntegrityChecker::default();
    let mut report = IntegrityReport::new(table.frequency, table.len());
    checker.check_series(&table, "cpi", "cpi_value", &expected, &mut report);
    checker.check_global(&table, &mut report);

    let shifts: Vec<_> = report.findings_of(FindingKind::DateShift).collect();
    assert!(!shifts.is_empty());
    assert_eq!(
        shifts[0].details,
        FindingDetails::DateShift {
            expected_date: d(2021, 1),
            found_date: d(2021, 2),
            days_shifted: 31,
            value: 100.0,
        }
    );
    assert_eq!(report.verdict(), Verdict::Failed);
}

#[test]
fn inner_merge_keeps_only_the_overlap() {
    let a = LoadedSource::from_records(
        "a",
        "x",
        ProviderSchema::Fred,
        (1..=6).map(|m| RawRecord::new(format!("2020-{m:02}-01"), "1")).collect(),
    );
    let b = LoadedSource::from_records(
        "b",
        "x",
        ProviderSchema::Fred,
        (4..=9).map(|m| RawRecord::new(format!("2020-{m:02}-01"), "2")).collect(),
    );
    let config = PipelineConfig {
        mode: MergeMode::Inner,
        derive_features: false,
        ..PipelineConfig::default()
    };

    let out = pipeline::run(&[a, b], &config).unwrap();
    assert_eq!(out.table.dates, (4..=6).map(|m| d(2020, m)).collect::<Vec<_>>());
    assert_eq!(out.integrity.unwrap().verdict(), Verdict::Clean);
}

#[test]
fn daily_series_aggregates_to_monthly_mean() {
    let daily = LoadedSource::from_records(
        "fx",
        "bok",
        ProviderSchema::Ecos,
        vec![
            RawRecord::new("20200102", "1100"),
            RawRecord::new("20200103", "1200"),
            RawRecord::new("20200203", "1300"),
        ],
    );
    let out = pipeline::run(&[daily], &merge_only((d(2020, 1), d(2020, 2)))).unwrap();
    assert_eq!(column(&out.table, "fx_value"), vec![Some(1150.0), Some(1300.0)]);
}
