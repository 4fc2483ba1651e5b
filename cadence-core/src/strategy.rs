//! Strategy boundary: the only contract the loop calls into.
//!
//! A strategy sees the world through a `StepContext`: the current timestamp,
//! a read-only portfolio snapshot, and bars visible up to the current step.
//! There is no way to reach past the clock from here.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::data::Timeline;
use crate::domain::{Asset, Bar, PortfolioSnapshot};
use crate::error::SetupError;
use crate::schedule::{Scheduler, TaskHandle};

/// Desired signed fraction of total equity per asset. Cash is the residual.
pub type TargetWeights = BTreeMap<Asset, f64>;

/// Bars visible at one step: for each asset, every bar with timestamp at or
/// before the step.
#[derive(Debug, Clone, Copy)]
pub struct VisibleBars<'a> {
    timeline: &'a Timeline,
    index: usize,
}

impl<'a> VisibleBars<'a> {
    pub(crate) fn new(timeline: &'a Timeline, index: usize) -> Self {
        Self { timeline, index }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timeline.timestamps()[self.index]
    }

    /// History of one asset, oldest first. Empty for unknown assets.
    pub fn bars(&self, asset: &str) -> &'a [Bar] {
        self.timeline.visible(asset, self.index)
    }

    /// Most recent visible bar, which may be from an earlier step.
    pub fn last(&self, asset: &str) -> Option<&'a Bar> {
        self.bars(asset).last()
    }

    pub fn close(&self, asset: &str) -> Option<f64> {
        self.last(asset).map(|b| b.close)
    }

    /// The asset's bar at exactly this step, if it has one.
    pub fn current(&self, asset: &str) -> Option<&'a Bar> {
        self.timeline.slot(asset, self.index).bar()
    }

    pub fn assets(&self) -> impl Iterator<Item = &'a Asset> {
        self.timeline.assets()
    }
}

/// Read-only view handed to every callback.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub timestamp: NaiveDateTime,
    pub portfolio: &'a PortfolioSnapshot,
    pub bars: VisibleBars<'a>,
}

/// User-supplied trading logic.
///
/// Strategies are `Send` so independent runs can execute on worker threads.
pub trait Strategy: Send {
    /// Register daily tasks. Called once, before the first step.
    fn register(&mut self, _scheduler: &mut Scheduler) -> Result<(), SetupError> {
        Ok(())
    }

    /// A registered task is due. Runs before `on_bar` on the same step.
    fn on_task(&mut self, _task: &TaskHandle, _ctx: &StepContext<'_>) {}

    /// Target weights for this step.
    fn on_bar(&mut self, ctx: &StepContext<'_>) -> TargetWeights;
}

/// Holds the same weights at every step.
#[derive(Debug, Clone, Default)]
pub struct FixedWeights {
    weights: TargetWeights,
}

impl FixedWeights {
    pub fn new(weights: TargetWeights) -> Self {
        Self { weights }
    }

    pub fn single(asset: impl Into<Asset>, weight: f64) -> Self {
        let mut weights = TargetWeights::new();
        weights.insert(asset.into(), weight);
        Self { weights }
    }
}

impl Strategy for FixedWeights {
    fn on_bar(&mut self, _ctx: &StepContext<'_>) -> TargetWeights {
        self.weights.clone()
    }
}

/// Adapts a closure into a strategy with no scheduled tasks.
pub struct FnStrategy<F>(pub F);

impl<F> Strategy for FnStrategy<F>
where
    F: FnMut(&StepContext<'_>) -> TargetWeights + Send,
{
    fn on_bar(&mut self, ctx: &StepContext<'_>) -> TargetWeights {
        (self.0)(ctx)
    }
}
