//! TOML run configuration: data source, preset and engine overrides.
//!
//! ```toml
//! name = "btc-hourly"
//! preset = "aggressive"
//!
//! [data]
//! path = "candles/btc_1h.csv"
//!
//! [engine]
//! fee_rate = 0.0005
//! [engine.risk]
//! base_leverage = 4.0
//! ```
//!
//! `[engine]` is merged key by key over the preset, so only the fields being
//! changed need to be written.

use crate::fitness::FitnessMetric;
use crate::sweep::ParamGrid;
use crate::synthetic::SyntheticSpec;
use perplab_core::config::{ConfigError, EngineConfig};
use perplab_core::presets;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading or resolving a run configuration.
#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown preset '{0}' (available: {list})", list = presets::PRESET_NAMES.join(", "))]
    UnknownPreset(String),

    #[error("invalid [engine] override: {0}")]
    Override(#[from] serde_json::Error),

    #[error("[data] must set exactly one of `path` or `synthetic`")]
    DataSource,

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Where candles come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// JSON or CSV candle file; relative paths resolve against the config file.
    pub path: Option<PathBuf>,
    pub synthetic: Option<SyntheticSpec>,
}

/// Resolved data source.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    File(PathBuf),
    Synthetic(SyntheticSpec),
}

/// One run (or sweep) described in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default)]
    pub data: DataConfig,
    /// Partial `EngineConfig` merged over the preset.
    #[serde(default)]
    pub engine: toml::Table,
    #[serde(default)]
    pub sweep: Option<ParamGrid>,
    #[serde(default)]
    pub fitness: FitnessMetric,
    /// Directory of the file this config was read from.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_name() -> String {
    "run".to_string()
}

fn default_preset() -> String {
    "balanced".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            preset: default_preset(),
            data: DataConfig::default(),
            engine: toml::Table::new(),
            sweep: None,
            fitness: FitnessMetric::default(),
            base_dir: None,
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, RunConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a config file; relative data paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, RunConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Preset with `[engine]` overrides applied, validated.
    pub fn engine_config(&self) -> Result<EngineConfig, RunConfigError> {
        let base = presets::preset(&self.preset).ok_or_else(|| RunConfigError::UnknownPreset(self.preset.clone()))?;
        let config = apply_overrides(&base, &self.engine)?;
        config.validate()?;
        Ok(config)
    }

    pub fn data_source(&self) -> Result<DataSource, RunConfigError> {
        match (&self.data.path, &self.data.synthetic) {
            (Some(path), None) => {
                let resolved = match &self.base_dir {
                    Some(dir) if path.is_relative() => dir.join(path),
                    _ => path.clone(),
                };
                Ok(DataSource::File(resolved))
            }
            (None, Some(spec)) => Ok(DataSource::Synthetic(spec.clone())),
            _ => Err(RunConfigError::DataSource),
        }
    }
}

/// Deep-merge a partial TOML table over a full config.
///
/// Merging happens on JSON values so that `None` fields of the base survive.
pub fn apply_overrides(base: &EngineConfig, overrides: &toml::Table) -> Result<EngineConfig, RunConfigError> {
    let mut merged = serde_json::to_value(base)?;
    let patch = serde_json::to_value(overrides)?;
    merge(&mut merged, patch);
    Ok(serde_json::from_value(merged)?)
}

fn merge(target: &mut serde_json::Value, patch: serde_json::Value) {
    match (target, patch) {
        (serde_json::Value::Object(target), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
