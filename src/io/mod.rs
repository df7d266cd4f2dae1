//! File store.
//!
//! - source CSV ingest by provider schema (`ingest`)
//! - merged table CSV read/write (`table`)
//! - report JSON and raw-record CSV exports (`export`)

pub mod export;
pub mod ingest;
pub mod table;

pub use export::*;
pub use ingest::{RowError, SourceFile, read_source, read_source_csv};
pub use table::*;
