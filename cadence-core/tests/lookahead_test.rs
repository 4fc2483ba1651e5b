//! Look-ahead contamination tests.
//!
//! Invariant: no decision, fill price, or valuation at step t may depend on
//! bars with timestamp later than t.
//!
//! Method: run the same strategy on a base series and on a copy with a large
//! price spike injected at a later timestamp. Everything recorded before the
//! spike must be identical between the two runs.

use cadence_core::calendar::{Session, WeekdayCalendar};
use cadence_core::data::Timeline;
use cadence_core::domain::Bar;
use cadence_core::engine::{run_backtest, EngineConfig, ExecutionTiming, RunResult};
use cadence_core::strategy::{StepContext, Strategy, TargetWeights};
use cadence_core::synthetic::{minute_universe, weekdays, WalkParams};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Momentum on visible history; panics if it is ever shown a future bar.
struct Momentum;

impl Strategy for Momentum {
    fn on_bar(&mut self, ctx: &StepContext<'_>) -> TargetWeights {
        let mut weights = TargetWeights::new();
        for asset in ctx.bars.assets() {
            let bars = ctx.bars.bars(asset);
            assert!(
                bars.iter().all(|b| b.timestamp <= ctx.timestamp),
                "{asset}: visible bar after {}",
                ctx.timestamp
            );
            if let Some(current) = ctx.bars.current(asset) {
                assert_eq!(current.timestamp, ctx.timestamp);
            }
            if bars.len() > 5 {
                let now = bars[bars.len() - 1].close;
                let then = bars[bars.len() - 6].close;
                weights.insert(asset.clone(), if now > then { 0.45 } else { 0.1 });
            }
        }
        weights
    }
}

fn base_bars() -> BTreeMap<String, Vec<Bar>> {
    let dates = weekdays(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 2);
    let session = Session::parse("09:30", "11:00").unwrap();
    minute_universe(99, &["AAA", "BBB"], &dates, session, WalkParams::default())
}

/// Multiply every AAA price at or after `from` by 10.
fn spiked(mut bars: BTreeMap<String, Vec<Bar>>, from: NaiveDateTime) -> BTreeMap<String, Vec<Bar>> {
    if let Some(series) = bars.get_mut("AAA") {
        for bar in series.iter_mut().filter(|b| b.timestamp >= from) {
            bar.open *= 10.0;
            bar.high *= 10.0;
            bar.low *= 10.0;
            bar.close *= 10.0;
        }
    }
    bars
}

fn run(bars: BTreeMap<String, Vec<Bar>>, timing: ExecutionTiming) -> RunResult {
    let timeline = Timeline::align(bars).unwrap();
    let calendar = WeekdayCalendar::new(Session::parse("09:30", "15:00").unwrap());
    let config = EngineConfig::new(100_000.0).with_execution(timing);
    run_backtest(&timeline, &calendar, &config, &mut Momentum).unwrap()
}

fn assert_prefix_identical(timing: ExecutionTiming) {
    let base = base_bars();
    let cutoff = base["AAA"][120].timestamp;

    let clean = run(base.clone(), timing);
    let dirty = run(spiked(base, cutoff), timing);

    let before = |r: &RunResult| {
        let equity: Vec<_> = r
            .equity_curve
            .iter()
            .filter(|p| p.timestamp < cutoff)
            .copied()
            .collect();
        let trades: Vec<_> = r
            .trades
            .iter()
            .filter(|t| t.timestamp < cutoff)
            .cloned()
            .collect();
        (equity, trades)
    };

    let (clean_equity, clean_trades) = before(&clean);
    let (dirty_equity, dirty_trades) = before(&dirty);
    assert_eq!(clean_equity.len(), 120);
    assert_eq!(clean_equity, dirty_equity);
    assert_eq!(clean_trades, dirty_trades);

    // The spike does change what comes after.
    assert_ne!(clean.equity_curve, dirty.equity_curve);
}

#[test]
fn future_spike_has_no_effect_on_earlier_steps_at_close() {
    assert_prefix_identical(ExecutionTiming::CurrentClose);
}

#[test]
fn future_spike_has_no_effect_on_earlier_steps_at_next_open() {
    assert_prefix_identical(ExecutionTiming::NextOpen);
}
