//! Bank of Korea ECOS `StatisticSearch` provider.
//!
//! Series ids are `STAT_CODE` or `STAT_CODE/ITEM_CODE` (e.g. `722Y001/0101000`).
//! The frequency hint picks the ECOS cycle and the matching period token
//! format for the request window:
//!
//! | hint | cycle | token |
//! | - | - | - |
//! | daily | `D` | `YYYYMMDD` |
//! | monthly (default) | `M` | `YYYYMM` |
//! | quarterly | `Q` | `YYYYQn` |
//! | annual | `A` | `YYYY` |

use chrono::{Datelike, Local, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::data::provider::{DataProvider, FetchRequest, InitError, ProviderError};
use crate::domain::{NativeFrequency, ProviderSchema, RawRecord, RawToken};

const PROVIDER: &str = "ecos";
const DEFAULT_BASE_URL: &str = "https://ecos.bok.or.kr/api/";
const ROW_LIMIT: usize = 10000;
/// ECOS "no data for the request" result code.
const NO_DATA_CODE: &str = "INFO-200";

pub struct EcosProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl EcosProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url,
        }
    }

    pub fn from_env() -> Result<Self, InitError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("BOK_API_KEY").map_err(|_| InitError::MissingCredential { var: "BOK_API_KEY" })?;
        if api_key.trim().is_empty() {
            return Err(InitError::MissingCredential { var: "BOK_API_KEY" });
        }
        let base_url = std::env::var("BOK_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http") {
            return Err(InitError::InvalidConfig {
                var: "BOK_API_URL",
                message: format!("'{base_url}' is not an http(s) URL"),
            });
        }
        Ok(Self::new(api_key.trim(), base_url))
    }

    fn request_url(&self, request: &FetchRequest, today: NaiveDate) -> String {
        let cycle = Cycle::from_hint(request.frequency_hint);
        let start = request
            .start
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(today));
        let end = request.end.unwrap_or(today);

        let (stat_code, item_code) = match request.series_id.split_once('/') {
            Some((stat, item)) => (stat, Some(item)),
            None => (request.series_id.as_str(), None),
        };

        let mut url = format!(
            "{}StatisticSearch/{}/json/kr/1/{}/{}/{}/{}/{}/",
            self.base_url,
            self.api_key,
            ROW_LIMIT,
            stat_code,
            cycle.code(),
            cycle.token(start),
            cycle.token(end)
        );
        if let Some(item) = item_code.filter(|s| !s.is_empty()) {
            url.push_str(item);
            url.push('/');
        }
        url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Daily,
    Monthly,
    Quarterly,
    Annual,
}

impl Cycle {
    fn from_hint(hint: Option<NativeFrequency>) -> Self {
        match hint {
            Some(NativeFrequency::Daily) => Cycle::Daily,
            Some(NativeFrequency::Quarterly) => Cycle::Quarterly,
            Some(NativeFrequency::Annual) => Cycle::Annual,
            // ECOS has no weekly cycle.
            _ => Cycle::Monthly,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Cycle::Daily => "D",
            Cycle::Monthly => "M",
            Cycle::Quarterly => "Q",
            Cycle::Annual => "A",
        }
    }

    fn token(self, date: NaiveDate) -> String {
        match self {
            Cycle::Daily => date.format("%Y%m%d").to_string(),
            Cycle::Monthly => date.format("%Y%m").to_string(),
            Cycle::Quarterly => format!("{}Q{}", date.year(), (date.month() - 1) / 3 + 1),
            Cycle::Annual => date.format("%Y").to_string(),
        }
    }
}

impl DataProvider for EcosProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn schema(&self) -> ProviderSchema {
        ProviderSchema::Ecos
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawRecord>, ProviderError> {
        let url = self.request_url(request, Local::now().date_naive());

        let resp = self.client.get(&url).send().map_err(|e| ProviderError::Request {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body: EcosResponse = resp.json().map_err(|e| ProviderError::Payload {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;

        let records = body.into_records()?;
        log::info!("ecos: fetched {} rows for {}", records.len(), request.series_id);
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct EcosResponse {
    #[serde(rename = "StatisticSearch")]
    statistic_search: Option<StatisticSearch>,
    #[serde(rename = "RESULT")]
    result: Option<EcosResult>,
}

#[derive(Debug, Deserialize)]
struct StatisticSearch {
    #[serde(default)]
    row: Vec<EcosRow>,
}

#[derive(Debug, Deserialize)]
struct EcosResult {
    #[serde(rename = "CODE")]
    code: String,
    #[serde(rename = "MESSAGE", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct EcosRow {
    #[serde(rename = "TIME")]
    time: RawToken,
    #[serde(rename = "DATA_VALUE")]
    data_value: RawToken,
    #[serde(rename = "UNIT_NAME", default)]
    unit_name: Option<String>,
    #[serde(rename = "ITEM_NAME1", default)]
    item_name: Option<String>,
}

impl EcosResponse {
    fn into_records(self) -> Result<Vec<RawRecord>, ProviderError> {
        if let Some(search) = self.statistic_search {
            return Ok(search.row.into_iter().map(EcosRow::into_record).collect());
        }
        match self.result {
            Some(result) if result.code == NO_DATA_CODE => Ok(Vec::new()),
            Some(result) => Err(ProviderError::Api {
                provider: PROVIDER.to_string(),
                code: result.code,
                message: result.message,
            }),
            None => Err(ProviderError::Payload {
                provider: PROVIDER.to_string(),
                message: "neither StatisticSearch nor RESULT in response".to_string(),
            }),
        }
    }
}

impl EcosRow {
    fn into_record(self) -> RawRecord {
        let mut record = RawRecord::new(self.time, self.data_value);
        if let Some(unit) = self.unit_name.filter(|s| !s.is_empty()) {
            record = record.with_tag("UNIT_NAME", unit);
        }
        if let Some(item) = self.item_name.filter(|s| !s.is_empty()) {
            record = record.with_tag("ITEM_NAME1", item);
        }
        record
    }
}
