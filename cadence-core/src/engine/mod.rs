//! Backtesting engine: the step loop and the state it owns.
//!
//! The engine consumes an aligned `Timeline`, a calendar, a strategy and an
//! `EngineConfig`, and runs strictly sequentially over the timeline:
//!
//! 1. Boundary: cancellation check, clock, trading-day rollover
//! 2. Deferred fills (next-open timing)
//! 3. Mark-to-market with carried-forward closes
//! 4. Scheduled tasks, then the strategy's per-bar callback
//! 5. Rebalance, risk checks, atomic commit
//! 6. Equity recording and drawdown breaker

pub mod accounting;
pub mod cancel;
pub mod clock;
pub mod loop_runner;
pub mod state;

pub use accounting::verify_equity;
pub use cancel::CancelToken;
pub use clock::SimulationClock;
pub use loop_runner::{run_backtest, run_backtest_with_cancel};
pub use state::{DailyRecord, EngineConfig, EquityPoint, ExecutionTiming, RunResult, StopReason};
