//! Cadence Runner: configuration, sweeps, metrics and artifacts.
//!
//! This crate builds on `cadence-core` to provide:
//! - TOML run configuration with content-addressed run ids
//! - Parallel parameter and config sweeps (rayon)
//! - Performance metrics over a finished run
//! - CSV/JSON artifact export
//! - Tracing subscriber setup

pub mod config;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod sweep;

pub use config::{ConfigError, RunConfig, RunId};
pub use export::{export_json, write_artifacts, ArtifactSet};
pub use logging::init_logging;
pub use metrics::{Drawdown, PerformanceMetrics};
pub use sweep::{run_config_sweep, run_sweep, SweepError, SweepResults, SweepRun};
