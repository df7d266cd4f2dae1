//! Reporting utilities: column coverage and formatted terminal output.

use chrono::NaiveDate;

use crate::merge::MergedTable;

pub mod format;

pub use format::{format_coverage, format_diagnostics, format_integrity_report, format_run_summary};

/// Populated span of one merged column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCoverage {
    pub name: String,
    pub valid: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Coverage of every value column, in table order.
pub fn column_coverage(table: &MergedTable) -> Vec<ColumnCoverage> {
    table
        .value_columns()
        .map(|col| {
            let mut populated = table
                .dates
                .iter()
                .zip(&col.values)
                .filter(|(_, v)| v.is_some())
                .map(|(d, _)| *d);
            let first = populated.next();
            let last = populated.last().or(first);
            ColumnCoverage {
                name: col.name.clone(),
                valid: col.valid_count(),
                first,
                last,
            }
        })
        .collect()
}
