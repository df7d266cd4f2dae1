//! FRED `series/observations` provider.

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::data::provider::{DataProvider, FetchRequest, InitError, ProviderError};
use crate::domain::{NativeFrequency, ProviderSchema, RawRecord};

const PROVIDER: &str = "fred";
const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const OBS_LIMIT: usize = 100000;

pub struct FredProvider {
    client: Client,
    api_key: String,
}

impl FredProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Result<Self, InitError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("FRED_API_KEY").map_err(|_| InitError::MissingCredential { var: "FRED_API_KEY" })?;
        if api_key.trim().is_empty() {
            return Err(InitError::MissingCredential { var: "FRED_API_KEY" });
        }
        Ok(Self::new(api_key.trim()))
    }

    fn error(message: impl std::fmt::Display) -> ProviderError {
        ProviderError::Request {
            provider: PROVIDER.to_string(),
            message: message.to_string(),
        }
    }
}

impl DataProvider for FredProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn schema(&self) -> ProviderSchema {
        ProviderSchema::Fred
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawRecord>, ProviderError> {
        let mut req = self.client.get(BASE_URL).query(&[
            ("series_id", request.series_id.as_str()),
            ("api_key", &self.api_key),
            ("file_type", "json"),
            ("sort_order", "asc"),
            ("limit", &OBS_LIMIT.to_string()),
        ]);

        if let Some(start) = request.start {
            req = req.query(&[("observation_start", &start.to_string())]);
        }
        if let Some(end) = request.end {
            req = req.query(&[("observation_end", &end.to_string())]);
        }
        if let Some(code) = request.frequency_hint.and_then(frequency_code) {
            req = req.query(&[("frequency", code)]);
        }

        let resp = req.send().map_err(Self::error)?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body: ObservationsResponse = resp.json().map_err(|e| ProviderError::Payload {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;

        let records = body.into_records();
        log::info!("fred: fetched {} observations for {}", records.len(), request.series_id);
        Ok(records)
    }
}

/// FRED aggregation codes for `frequency=`.
fn frequency_code(hint: NativeFrequency) -> Option<&'static str> {
    match hint {
        NativeFrequency::Daily => Some("d"),
        NativeFrequency::Weekly => Some("w"),
        NativeFrequency::Monthly => Some("m"),
        NativeFrequency::Quarterly => Some("q"),
        NativeFrequency::Annual => Some("a"),
        NativeFrequency::Unknown => None,
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
    #[serde(default)]
    realtime_start: Option<String>,
}

impl ObservationsResponse {
    /// FRED's `.` missing marker is passed through untouched; the value parser
    /// turns it into a null.
    fn into_records(self) -> Vec<RawRecord> {
        self.observations
            .into_iter()
            .map(|obs| {
                let record = RawRecord::new(obs.date, obs.value);
                match obs.realtime_start {
                    Some(rt) => record.with_tag("realtime_start", rt),
                    None => record,
                }
            })
            .collect()
    }
}
