//! Cadence Core: deterministic multi-asset backtesting engine.
//!
//! This crate contains the simulation core:
//! - Domain types (bars, orders, positions, portfolio, trade records)
//! - Trading calendar boundary and timeline alignment
//! - Daily time-of-day scheduler with per-task state machines
//! - Strategy boundary (`Strategy`, `StepContext`)
//! - Weight-to-order rebalancing, risk checks, atomic accounting
//! - The sequential step loop

pub mod calendar;
pub mod costs;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod rebalance;
pub mod risk;
pub mod schedule;
pub mod strategy;
pub mod synthetic;

pub use calendar::{Session, StaticCalendar, TradingCalendar, WeekdayCalendar};
pub use costs::CommissionModel;
pub use data::{BarSlot, Timeline};
pub use domain::{Asset, Bar, Order, Portfolio, PortfolioSnapshot, TradeRecord};
pub use engine::{
    run_backtest, run_backtest_with_cancel, CancelToken, EngineConfig, ExecutionTiming, RunResult,
    StopReason,
};
pub use error::{ArithmeticFault, EngineError, SetupError};
pub use rebalance::RebalanceFrequency;
pub use risk::{RiskAction, RiskEvent, RiskLimits, RiskReason, SettlementRule};
pub use schedule::{Scheduler, TaskFiring, TaskHandle};
pub use strategy::{FixedWeights, FnStrategy, StepContext, Strategy, TargetWeights};
