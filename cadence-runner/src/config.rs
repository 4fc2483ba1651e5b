//! Serializable run configuration.
//!
//! `RunConfig` is the on-disk form of an engine configuration. It loads from
//! TOML, converts into `EngineConfig`, and is content-addressed: two configs
//! that serialize identically share a `RunId`.
//!
//! ```toml
//! name = "equal-weight"
//! initial_cash = 250000.0
//! execution = "next_open"
//! settlement = "next_day"
//! rebalance = { every_n_days = 5 }
//!
//! [commission]
//! rate = 0.0005
//! fixed = 1.0
//!
//! [limits]
//! max_asset_weight = 0.2
//! lot_size = 1.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use cadence_core::engine::{EngineConfig, ExecutionTiming};
use cadence_core::rebalance::RebalanceFrequency;
use cadence_core::risk::{RiskLimits, SettlementRule};
use cadence_core::{CommissionModel, SetupError};

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] SetupError),
}

/// Everything needed to reproduce a run's engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Free-form label carried into artifacts. Part of the run id.
    pub name: String,
    pub initial_cash: f64,
    pub execution: ExecutionTiming,
    pub commission: CommissionModel,
    pub limits: RiskLimits,
    pub settlement: SettlementRule,
    pub rebalance: RebalanceFrequency,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_engine("default", &EngineConfig::default())
    }
}

impl RunConfig {
    pub fn from_engine(name: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            name: name.into(),
            initial_cash: config.initial_cash,
            execution: config.execution,
            commission: config.commission,
            limits: config.limits,
            settlement: config.settlement,
            rebalance: config.rebalance,
        }
    }

    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_engine_config().validate()?;
        Ok(())
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.initial_cash)
            .with_execution(self.execution)
            .with_commission(self.commission)
            .with_limits(self.limits)
            .with_settlement(self.settlement)
            .with_rebalance(self.rebalance)
    }

    /// Deterministic hash of the canonical JSON form.
    ///
    /// Field order is fixed by the struct definition, so equal configs always
    /// hash equally regardless of how the TOML was laid out.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
