//! Step-by-step simulation loop: the heart of the engine.
//!
//! Phases per timeline step:
//! 1. Boundary: honour cancellation, advance the clock, roll the trading day
//! 2. Deferred fills: execute weights held from the previous step (next-open timing)
//! 3. Marks: carry forward the last close of every asset with a bar
//! 4. Callbacks: due tasks in registration order, then the strategy's `on_bar`
//! 5. Rebalance: weights → orders → risk → atomic commit (current-close timing)
//! 6. Post-step: equity point, accounting identity, drawdown breaker
//!
//! Everything runs on the calling thread. Nothing here blocks.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::calendar::TradingCalendar;
use crate::data::{Step, Timeline};
use crate::domain::{Asset, MarkBook, Portfolio, TradeRecord};
use crate::error::{ArithmeticFault, EngineError, SetupError};
use crate::rebalance::{RebalanceGate, Rebalancer};
use crate::risk::{RiskEvent, RiskManager, RiskView};
use crate::schedule::{Scheduler, TaskFiring, TaskId};
use crate::strategy::{StepContext, Strategy, TargetWeights, VisibleBars};

use super::accounting::verify_equity;
use super::cancel::CancelToken;
use super::clock::SimulationClock;
use super::state::{DailyRecord, EngineConfig, EquityPoint, ExecutionTiming, RunResult, StopReason};

/// Run a backtest to completion.
///
/// Setup problems (bad config, malformed task times, duplicate tasks, empty
/// data) are returned before the first step. An arithmetic fault mid-run is
/// returned as `EngineError::Fault` carrying everything committed so far.
pub fn run_backtest(
    timeline: &Timeline,
    calendar: &dyn TradingCalendar,
    config: &EngineConfig,
    strategy: &mut dyn Strategy,
) -> Result<RunResult, EngineError> {
    run_backtest_with_cancel(timeline, calendar, config, strategy, &CancelToken::new())
}

/// Like [`run_backtest`], stopping cleanly at the next step boundary once
/// `cancel` is set.
pub fn run_backtest_with_cancel(
    timeline: &Timeline,
    calendar: &dyn TradingCalendar,
    config: &EngineConfig,
    strategy: &mut dyn Strategy,
    cancel: &CancelToken,
) -> Result<RunResult, EngineError> {
    config.validate()?;
    if timeline.is_empty() {
        return Err(SetupError::EmptyUniverse.into());
    }

    let mut scheduler = Scheduler::new();
    strategy.register(&mut scheduler)?;
    scheduler.start();

    info!(
        assets = timeline.asset_count(),
        steps = timeline.len(),
        tasks = scheduler.len(),
        execution = ?config.execution,
        "backtest started"
    );

    let mut sim = Simulation::new(timeline, calendar, config, scheduler);
    let stop = match sim.drive(strategy, cancel) {
        Ok(stop) => stop,
        Err(fault) => {
            error!(%fault, steps = sim.steps_processed, "backtest aborted");
            let partial = sim.finish(StopReason::Fault(fault.to_string()));
            return Err(EngineError::Fault {
                fault,
                partial: Box::new(partial),
            });
        }
    };

    let result = sim.finish(stop);
    info!(
        stop = ?result.stop_reason,
        steps = result.steps_processed,
        trades = result.trades.len(),
        final_equity = result.final_equity(),
        "backtest finished"
    );
    Ok(result)
}

/// Mutable state of one run.
struct Simulation<'a> {
    timeline: &'a Timeline,
    calendar: &'a dyn TradingCalendar,
    timing: ExecutionTiming,
    initial_cash: f64,

    clock: SimulationClock,
    scheduler: Scheduler,
    rebalancer: Rebalancer,
    risk: RiskManager,
    gate: RebalanceGate,
    universe: BTreeSet<Asset>,

    portfolio: Portfolio,
    /// Last known close per asset.
    marks: MarkBook,
    /// Holdings and marks as of the last committed step.
    committed: Portfolio,
    committed_marks: MarkBook,
    /// Trades and risk events of the step in progress.
    step_trades: Vec<TradeRecord>,
    step_events: Vec<RiskEvent>,
    /// Weights awaiting the next open.
    pending: Option<TargetWeights>,

    current_day: Option<NaiveDate>,
    last_equity: f64,
    prev_day_equity: f64,
    steps_processed: usize,

    equity_curve: Vec<EquityPoint>,
    trades: Vec<TradeRecord>,
    risk_events: Vec<RiskEvent>,
    task_firings: Vec<TaskFiring>,
    daily_records: Vec<DailyRecord>,
}

impl<'a> Simulation<'a> {
    fn new(
        timeline: &'a Timeline,
        calendar: &'a dyn TradingCalendar,
        config: &EngineConfig,
        scheduler: Scheduler,
    ) -> Self {
        let limits = config.limits;
        Self {
            timeline,
            calendar,
            timing: config.execution,
            initial_cash: config.initial_cash,
            clock: SimulationClock::new(),
            scheduler,
            rebalancer: Rebalancer::new(limits.lot_size, limits.min_order_notional, config.commission),
            risk: RiskManager::new(limits, config.commission, config.settlement),
            gate: RebalanceGate::new(config.rebalance),
            universe: timeline.assets().cloned().collect(),
            portfolio: Portfolio::new(config.initial_cash),
            marks: MarkBook::new(),
            committed: Portfolio::new(config.initial_cash),
            committed_marks: MarkBook::new(),
            step_trades: Vec::new(),
            step_events: Vec::new(),
            pending: None,
            current_day: None,
            last_equity: config.initial_cash,
            prev_day_equity: config.initial_cash,
            steps_processed: 0,
            equity_curve: Vec::with_capacity(timeline.len()),
            trades: Vec::new(),
            risk_events: Vec::new(),
            task_firings: Vec::new(),
            daily_records: Vec::new(),
        }
    }

    fn drive(
        &mut self,
        strategy: &mut dyn Strategy,
        cancel: &CancelToken,
    ) -> Result<StopReason, ArithmeticFault> {
        let timeline = self.timeline;

        for step in timeline.steps() {
            // ─── Phase 1: Boundary ───
            if cancel.is_cancelled() {
                info!(at = %step.timestamp(), "backtest cancelled");
                return Ok(StopReason::Cancelled);
            }
            let now = self.clock.advance(step.index(), step.timestamp());

            let date = now.date();
            if self.current_day != Some(date) {
                self.roll_day(date);
            }
            let trading = self.calendar.is_trading_day(date);
            let in_session = self
                .calendar
                .session(date)
                .is_some_and(|s| s.contains(now.time()));

            // ─── Phase 2: Deferred fills ───
            if trading && in_session {
                if let Some(weights) = self.pending.take() {
                    self.execute(&step, &weights)?;
                }
            }

            // ─── Phase 3: Marks ───
            for (asset, bar) in step.bars() {
                self.marks.insert(asset.clone(), bar.close);
            }

            // ─── Phase 4: Callbacks ───
            let due = self.scheduler.due(now, self.calendar);
            if trading {
                let weights = self.callbacks(&due, strategy);

                // ─── Phase 5: Rebalance ───
                if in_session && self.gate.is_open(date) {
                    self.gate.mark(date);
                    match self.timing {
                        ExecutionTiming::CurrentClose => self.execute(&step, &weights)?,
                        ExecutionTiming::NextOpen => self.pending = Some(weights),
                    }
                }
            }

            // ─── Phase 6: Post-step ───
            let equity = self.commit_step(now)?;
            if let Some(drawdown) = self.risk.drawdown_breach(equity) {
                warn!(at = %now, drawdown, equity, "drawdown limit reached, halting");
                return Ok(StopReason::DrawdownHalt);
            }
        }

        Ok(StopReason::Completed)
    }

    /// Close out the previous day and reset per-day state.
    fn roll_day(&mut self, date: NaiveDate) {
        self.close_day();
        self.current_day = Some(date);
        self.risk.begin_day(date, self.last_equity);
    }

    fn close_day(&mut self) {
        let Some(date) = self.current_day else {
            return;
        };
        let pnl = self.last_equity - self.prev_day_equity;
        let daily_return = if self.prev_day_equity != 0.0 {
            pnl / self.prev_day_equity
        } else {
            0.0
        };
        self.daily_records.push(DailyRecord {
            date,
            equity: self.last_equity,
            cash: self.committed.cash,
            pnl,
            daily_return,
        });
        self.prev_day_equity = self.last_equity;
    }

    /// Fire due tasks, then ask the strategy for weights.
    ///
    /// The context is bounded by the clock, never by the step being driven.
    fn callbacks(&mut self, due: &[TaskId], strategy: &mut dyn Strategy) -> TargetWeights {
        let (Some(index), Some(timestamp)) = (self.clock.index(), self.clock.now()) else {
            return TargetWeights::new();
        };
        let snapshot = self.portfolio.snapshot(timestamp, &self.marks);
        let ctx = StepContext {
            timestamp,
            portfolio: &snapshot,
            bars: VisibleBars::new(self.timeline, index),
        };

        for &id in due {
            let Some(handle) = self.scheduler.handle(id) else {
                continue;
            };
            debug!(task = %handle, at = %timestamp, "task fired");
            self.task_firings.push(TaskFiring {
                timestamp,
                task: handle.clone(),
            });
            strategy.on_task(handle, &ctx);
        }

        strategy.on_bar(&ctx)
    }

    /// Turn weights into orders at this step's fill prices and commit them.
    fn execute(&mut self, step: &Step<'_>, weights: &TargetWeights) -> Result<(), ArithmeticFault> {
        let timestamp = step.timestamp();
        let timing = self.timing;
        let prices: BTreeMap<Asset, f64> = step
            .bars()
            .map(|(asset, bar)| (asset.clone(), timing.fill_price(bar)))
            .collect();

        // Value the book at the prices orders will fill at.
        let marks: Cow<'_, MarkBook> = match timing {
            ExecutionTiming::CurrentClose => Cow::Borrowed(&self.marks),
            ExecutionTiming::NextOpen => {
                let mut overlay = self.marks.clone();
                overlay.extend(prices.iter().map(|(a, p)| (a.clone(), *p)));
                Cow::Owned(overlay)
            }
        };

        let equity = self.portfolio.equity(&marks);
        if !equity.is_finite() {
            return Err(ArithmeticFault::NonFinite {
                timestamp,
                what: "equity".into(),
            });
        }
        if equity <= 0.0 {
            return Err(ArithmeticFault::NonPositiveEquity { timestamp, equity });
        }

        let orders = self
            .rebalancer
            .orders(weights, &self.portfolio, equity, &prices, &self.universe);
        let view = RiskView {
            timestamp,
            portfolio: &self.portfolio,
            marks: &marks,
            equity,
        };
        let (orders, events) = self.risk.check(&view, orders);
        if orders.is_empty() {
            self.step_events.extend(events);
            return Ok(());
        }

        let trades = self.portfolio.apply(timestamp, &orders)?;
        self.risk.record_trades(&trades);
        debug!(at = %timestamp, trades = trades.len(), cash = self.portfolio.cash, "orders applied");
        self.step_events.extend(events);
        self.step_trades.extend(trades);
        Ok(())
    }

    /// Record end-of-step equity and promote the step's state to committed.
    ///
    /// On a fault nothing from this step reaches the result.
    fn commit_step(&mut self, timestamp: NaiveDateTime) -> Result<f64, ArithmeticFault> {
        let equity = verify_equity(&self.portfolio, &self.marks);
        if !equity.is_finite() {
            return Err(ArithmeticFault::NonFinite {
                timestamp,
                what: "equity".into(),
            });
        }
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity,
            cash: self.portfolio.cash,
        });
        self.committed.clone_from(&self.portfolio);
        self.committed_marks.clone_from(&self.marks);
        self.trades.append(&mut self.step_trades);
        self.risk_events.append(&mut self.step_events);
        self.last_equity = equity;
        self.steps_processed += 1;
        Ok(equity)
    }

    fn finish(mut self, stop_reason: StopReason) -> RunResult {
        self.close_day();
        let timestamp = self
            .equity_curve
            .last()
            .map(|p| p.timestamp)
            .or_else(|| self.timeline.timestamps().first().copied())
            .unwrap_or_default();

        RunResult {
            initial_cash: self.initial_cash,
            final_snapshot: self.committed.snapshot(timestamp, &self.committed_marks),
            equity_curve: self.equity_curve,
            trades: self.trades,
            risk_events: self.risk_events,
            task_firings: self.task_firings,
            daily_records: self.daily_records,
            steps_processed: self.steps_processed,
            total_steps: self.timeline.len(),
            stop_reason,
        }
    }
}
