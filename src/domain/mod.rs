//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - frequency/aggregation/merge configuration enums (`Frequency`, `Aggregation`, `MergeMode`)
//! - provider column conventions (`ProviderSchema`)
//! - raw and normalized observations (`RawRecord`, `NormalizedObservation`, `SeriesFrame`)

pub mod types;

pub use types::*;
