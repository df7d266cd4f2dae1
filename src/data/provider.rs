//! Data provider seam.
//!
//! Providers hand over `RawRecord`s and nothing else; all parsing happens in
//! the normalizer. Construction returns explicit `Result`s so a caller can
//! decide whether a missing credential is fatal for its use case.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::{EcosProvider, FredProvider};
use crate::domain::{NativeFrequency, ProviderSchema, RawRecord};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} request failed with status {status}")]
    Status { provider: String, status: u16 },

    #[error("failed to parse {provider} response: {message}")]
    Payload { provider: String, message: String },

    #[error("{provider} API error {code}: {message}")]
    Api {
        provider: String,
        code: String,
        message: String,
    },

    #[error("unknown series '{series_id}' for {provider}")]
    UnknownSeries { provider: String, series_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("missing {var} in environment (.env)")]
    MissingCredential { var: &'static str },

    #[error("invalid {var}: {message}")]
    InvalidConfig { var: &'static str, message: String },

    #[error("unknown provider '{name}' (available: {})", .available.join(", "))]
    UnknownProvider { name: String, available: Vec<String> },
}

/// One `fetch` call: series plus optional window and cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub series_id: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub frequency_hint: Option<NativeFrequency>,
}

impl FetchRequest {
    pub fn new(series_id: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            start: None,
            end: None,
            frequency_hint: None,
        }
    }

    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_hint(mut self, hint: Option<NativeFrequency>) -> Self {
        self.frequency_hint = hint;
        self
    }
}

pub trait DataProvider: Send + Sync {
    /// Stable identifier (`fred`, `ecos`, ...), also used as the series source.
    fn name(&self) -> &str;

    /// Column layout of the records this provider returns.
    fn schema(&self) -> ProviderSchema;

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawRecord>, ProviderError>;
}

/// In-memory provider keyed by series id.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    schema: ProviderSchema,
    series: BTreeMap<String, Vec<RawRecord>>,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, schema: ProviderSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            series: BTreeMap::new(),
        }
    }

    pub fn with_series(mut self, series_id: impl Into<String>, records: Vec<RawRecord>) -> Self {
        self.series.insert(series_id.into(), records);
        self
    }
}

impl DataProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> ProviderSchema {
        self.schema.clone()
    }

    /// The window is not applied; records are returned as stored.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawRecord>, ProviderError> {
        self.series
            .get(&request.series_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownSeries {
                provider: self.name.clone(),
                series_id: request.series_id.clone(),
            })
    }
}

/// Providers available in this process, each with its own init outcome.
pub struct ProviderRegistry {
    providers: Vec<(String, Result<Box<dyn DataProvider>, InitError>)>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self { providers: Vec::new() }
    }

    /// Load `.env`, then try to build every network provider.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut registry = Self::empty();
        registry.insert(
            "fred",
            FredProvider::from_env().map(|p| Box::new(p) as Box<dyn DataProvider>),
        );
        registry.insert(
            "ecos",
            EcosProvider::from_env().map(|p| Box::new(p) as Box<dyn DataProvider>),
        );
        for (name, outcome) in &registry.providers {
            if let Err(e) = outcome {
                log::debug!("provider '{name}' unavailable: {e}");
            }
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, provider: Result<Box<dyn DataProvider>, InitError>) {
        let name = name.into();
        self.providers.retain(|(n, _)| *n != name);
        self.providers.push((name, provider));
    }

    pub fn with_provider(mut self, provider: impl DataProvider + 'static) -> Self {
        let name = provider.name().to_string();
        self.insert(name, Ok(Box::new(provider)));
        self
    }

    /// The provider, or why it is not available.
    pub fn get(&self, name: &str) -> Result<&dyn DataProvider, InitError> {
        match self.providers.iter().find(|(n, _)| n == name) {
            Some((_, Ok(p))) => Ok(p.as_ref()),
            Some((_, Err(e))) => Err(e.clone()),
            None => Err(InitError::UnknownProvider {
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            }),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|(n, _)| n.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_stored_records() {
        let provider = StaticProvider::new("mem", ProviderSchema::Fred)
            .with_series("CPI", vec![RawRecord::new("2020-01-01", "1.0")]);
        assert_eq!(provider.fetch(&FetchRequest::new("CPI")).unwrap().len(), 1);
        assert!(matches!(
            provider.fetch(&FetchRequest::new("GDP")),
            Err(ProviderError::UnknownSeries { .. })
        ));
    }

    #[test]
    fn registry_reports_why_a_provider_is_missing() {
        let mut registry = ProviderRegistry::empty().with_provider(StaticProvider::new("mem", ProviderSchema::Ecos));
        registry.insert("fred", Err(InitError::MissingCredential { var: "FRED_API_KEY" }));

        assert_eq!(registry.get("mem").unwrap().name(), "mem");
        assert_eq!(
            registry.get("fred").err(),
            Some(InitError::MissingCredential { var: "FRED_API_KEY" })
        );
        assert_eq!(registry.names(), vec!["mem", "fred"]);

        let unknown = registry.get("kosis").err().unwrap();
        assert_eq!(
            unknown,
            InitError::UnknownProvider {
                name: "kosis".into(),
                available: vec!["mem".into(), "fred".into()],
            }
        );
        assert_eq!(unknown.to_string(), "unknown provider 'kosis' (available: mem, fred)");
    }
}
