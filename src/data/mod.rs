//! Data providers.
//!
//! - `provider`: the `DataProvider` trait, errors, in-memory provider, registry
//! - `fred`: FRED observations API
//! - `ecos`: Bank of Korea ECOS API

pub mod ecos;
pub mod fred;
pub mod provider;

pub use ecos::EcosProvider;
pub use fred::FredProvider;
pub use provider::{DataProvider, FetchRequest, InitError, ProviderError, ProviderRegistry, StaticProvider};
