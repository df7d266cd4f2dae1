//! Run configuration.
//!
//! - `SourceManifest`: JSON list of sources (files or provider series)
//! - `PipelineConfig`: resolved options for one pipeline run
//!
//! Provider credentials come from the environment / `.env` (see `data`).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::domain::{Aggregation, ColumnNaming, Frequency, MergeMode, NativeFrequency, ProviderSchema, Tolerance};
use crate::error::AppError;
use crate::features::FeatureOptions;

/// Where one series comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    /// Series name; the merged column is `{name}_value`.
    pub name: String,
    /// Source identifier; defaults to the provider name, or `file`.
    #[serde(default)]
    pub source: Option<String>,
    /// Raw CSV path. Relative paths resolve against the manifest's directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub series_id: Option<String>,
    /// `ecos`, `kosis`, `fred`, `auto` (default) or `{"custom": {"date": .., "value": ..}}`.
    #[serde(default, deserialize_with = "deserialize_schema")]
    pub schema: Option<ProviderSchema>,
    #[serde(default)]
    pub aggregation: Aggregation,
    /// Cadence hint for dates the structural rules cannot classify.
    #[serde(default)]
    pub hint: Option<NativeFrequency>,
}

impl SourceEntry {
    pub fn source_id(&self) -> String {
        self.source
            .clone()
            .or_else(|| self.provider.clone())
            .unwrap_or_else(|| "file".to_string())
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("source with an empty `name`".to_string());
        }
        match (&self.path, &self.provider, &self.series_id) {
            (Some(_), None, _) => Ok(()),
            (None, Some(_), Some(_)) => Ok(()),
            (None, Some(_), None) => Err(format!("source '{}': `provider` requires `series_id`", self.name)),
            (Some(_), Some(_), _) => Err(format!("source '{}': set either `path` or `provider`, not both", self.name)),
            (None, None, _) => Err(format!("source '{}': needs `path` or `provider`", self.name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceManifest {
    pub sources: Vec<SourceEntry>,
}

impl SourceManifest {
    pub fn from_json(text: &str) -> Result<Self, AppError> {
        let manifest: SourceManifest =
            serde_json::from_str(text).map_err(|e| AppError::new(2, format!("Invalid source manifest: {e}")))?;
        if manifest.sources.is_empty() {
            return Err(AppError::new(2, "Source manifest lists no sources."));
        }
        for entry in &manifest.sources {
            entry.validate().map_err(|e| AppError::new(2, format!("Invalid source manifest: {e}")))?;
        }
        Ok(manifest)
    }

    /// Resolve relative file paths against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for entry in &mut self.sources {
            if let Some(path) = &entry.path {
                if path.is_relative() {
                    entry.path = Some(base.join(path));
                }
            }
        }
        self
    }
}

pub fn load_manifest(path: &Path) -> Result<SourceManifest, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read manifest '{}': {e}", path.display())))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(SourceManifest::from_json(&text)?.resolve_paths(base))
}

fn deserialize_schema<'de, D>(deserializer: D) -> Result<Option<ProviderSchema>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SchemaField {
        Keyword(String),
        Schema(ProviderSchema),
    }

    match Option::<SchemaField>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SchemaField::Schema(schema)) => Ok(Some(schema)),
        Some(SchemaField::Keyword(k)) => match k.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(None),
            "ecos" => Ok(Some(ProviderSchema::Ecos)),
            "kosis" => Ok(Some(ProviderSchema::Kosis)),
            "fred" => Ok(Some(ProviderSchema::Fred)),
            other => Err(serde::de::Error::custom(format!(
                "unknown schema '{other}' (expected ecos, kosis, fred, auto or a custom object)"
            ))),
        },
    }
}

/// Options of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub frequency: Frequency,
    pub mode: MergeMode,
    pub naming: ColumnNaming,
    pub range: Option<(NaiveDate, NaiveDate)>,
    /// Append calendar parts and percentage changes.
    pub derive_features: bool,
    pub features: FeatureOptions,
    pub tolerance: Tolerance,
    /// Re-derive file sources and check the merged table.
    pub run_integrity: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Monthly,
            mode: MergeMode::Outer,
            naming: ColumnNaming::SeriesName,
            range: None,
            derive_features: true,
            features: FeatureOptions::default(),
            tolerance: Tolerance::default(),
            run_integrity: true,
        }
    }
}
