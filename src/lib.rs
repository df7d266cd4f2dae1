//! `kmacro` library crate.
//!
//! The binary (`kmacro`) is a thin wrapper around this library so that:
//!
//! - the normalize / resample / merge / check core is testable without spawning processes
//! - the pipeline can be driven from other tools with in-memory providers
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod integrity;
pub mod io;
pub mod merge;
pub mod normalize;
pub mod report;
pub mod resample;
