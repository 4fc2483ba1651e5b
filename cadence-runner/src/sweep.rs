//! Parameter sweeps: many isolated runs over the same bar data.
//!
//! Each parameter value gets its own strategy instance and its own engine
//! state; the timeline and calendar are borrowed read-only by every worker.
//! Runs execute in parallel on the rayon pool and results come back in input
//! order, so a sweep is as deterministic as its individual runs.

use rayon::prelude::*;
use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, info};

use cadence_core::calendar::TradingCalendar;
use cadence_core::data::Timeline;
use cadence_core::engine::{run_backtest, EngineConfig, RunResult};
use cadence_core::strategy::Strategy;
use cadence_core::EngineError;

use crate::config::RunConfig;
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
#[error("sweep run '{label}' failed: {source}")]
pub struct SweepError {
    pub label: String,
    #[source]
    pub source: EngineError,
}

/// One completed run of a sweep.
#[derive(Debug, Clone)]
pub struct SweepRun {
    pub label: String,
    pub result: RunResult,
    pub metrics: PerformanceMetrics,
}

/// All runs of a sweep, in input order.
#[derive(Debug, Clone, Default)]
pub struct SweepResults {
    pub runs: Vec<SweepRun>,
}

impl SweepResults {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Runs sorted by `key`, highest first. Ties keep input order.
    pub fn ranked_by<F>(&self, key: F) -> Vec<&SweepRun>
    where
        F: Fn(&PerformanceMetrics) -> f64,
    {
        let mut ranked: Vec<&SweepRun> = self.runs.iter().collect();
        ranked.sort_by(|a, b| key(&b.metrics).total_cmp(&key(&a.metrics)));
        ranked
    }

    pub fn best_by<F>(&self, key: F) -> Option<&SweepRun>
    where
        F: Fn(&PerformanceMetrics) -> f64,
    {
        self.ranked_by(key).into_iter().next()
    }
}

/// Run one backtest per strategy parameter, all with `base_config`.
///
/// The first failing run (in input order) is returned as the error.
pub fn run_sweep<P, S, F>(
    params: &[P],
    timeline: &Timeline,
    calendar: &dyn TradingCalendar,
    base_config: &EngineConfig,
    strategy_factory: F,
) -> Result<SweepResults, SweepError>
where
    P: Debug + Sync,
    S: Strategy,
    F: Fn(&P) -> S + Sync,
{
    info!(runs = params.len(), steps = timeline.len(), "starting strategy sweep");
    let outcomes: Vec<Result<SweepRun, SweepError>> = params
        .par_iter()
        .map(|param| {
            let label = format!("{param:?}");
            let mut strategy = strategy_factory(param);
            execute(label, timeline, calendar, base_config, &mut strategy)
        })
        .collect();
    collect(outcomes)
}

/// Run one backtest per engine configuration, each with a fresh strategy.
pub fn run_config_sweep<S, F>(
    configs: &[RunConfig],
    timeline: &Timeline,
    calendar: &dyn TradingCalendar,
    strategy_factory: F,
) -> Result<SweepResults, SweepError>
where
    S: Strategy,
    F: Fn() -> S + Sync,
{
    info!(runs = configs.len(), steps = timeline.len(), "starting config sweep");
    let outcomes: Vec<Result<SweepRun, SweepError>> = configs
        .par_iter()
        .map(|config| {
            let mut strategy = strategy_factory();
            let engine = config.to_engine_config();
            execute(config.name.clone(), timeline, calendar, &engine, &mut strategy)
        })
        .collect();
    collect(outcomes)
}

fn execute(
    label: String,
    timeline: &Timeline,
    calendar: &dyn TradingCalendar,
    config: &EngineConfig,
    strategy: &mut dyn Strategy,
) -> Result<SweepRun, SweepError> {
    match run_backtest(timeline, calendar, config, strategy) {
        Ok(result) => {
            let metrics = PerformanceMetrics::compute(&result);
            debug!(
                label = %label,
                total_return = metrics.total_return,
                trades = metrics.trade_count,
                "sweep run finished"
            );
            Ok(SweepRun {
                label,
                result,
                metrics,
            })
        }
        Err(source) => Err(SweepError { label, source }),
    }
}

fn collect(outcomes: Vec<Result<SweepRun, SweepError>>) -> Result<SweepResults, SweepError> {
    let runs = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;
    info!(runs = runs.len(), "sweep complete");
    Ok(SweepResults { runs })
}
