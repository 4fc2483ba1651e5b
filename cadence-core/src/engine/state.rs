//! Engine configuration and run result types.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::costs::CommissionModel;
use crate::domain::{Bar, PortfolioSnapshot, TradeRecord};
use crate::error::SetupError;
use crate::rebalance::RebalanceFrequency;
use crate::risk::{RiskEvent, RiskLimits, SettlementRule};
use crate::schedule::TaskFiring;

/// Which price orders execute at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTiming {
    /// Fill at the close of the step that produced the weights.
    #[default]
    CurrentClose,
    /// Hold the weights and fill at the open of the next in-session step.
    NextOpen,
}

impl ExecutionTiming {
    pub fn fill_price(self, bar: &Bar) -> f64 {
        match self {
            ExecutionTiming::CurrentClose => bar.close,
            ExecutionTiming::NextOpen => bar.open,
        }
    }
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_cash: f64,
    pub execution: ExecutionTiming,
    pub commission: CommissionModel,
    pub limits: RiskLimits,
    pub settlement: SettlementRule,
    pub rebalance: RebalanceFrequency,
}

impl EngineConfig {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            execution: ExecutionTiming::default(),
            commission: CommissionModel::zero(),
            limits: RiskLimits::default(),
            settlement: SettlementRule::default(),
            rebalance: RebalanceFrequency::default(),
        }
    }

    pub fn with_execution(mut self, execution: ExecutionTiming) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_commission(mut self, commission: CommissionModel) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_limits(mut self, limits: RiskLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_settlement(mut self, settlement: SettlementRule) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn with_rebalance(mut self, rebalance: RebalanceFrequency) -> Self {
        self.rebalance = rebalance;
        self
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(SetupError::InvalidConfig(format!(
                "initial_cash must be positive, got {}",
                self.initial_cash
            )));
        }
        self.commission.validate()?;
        self.limits.validate()?;
        self.rebalance.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(1_000_000.0)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    Cancelled,
    DrawdownHalt,
    Fault(String),
}

/// End-of-step portfolio valuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub cash: f64,
}

/// End-of-day summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    /// Change from the previous day's equity (initial cash for the first day).
    pub pnl: f64,
    pub daily_return: f64,
}

/// Everything a run produced, up to its last committed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_cash: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub final_snapshot: PortfolioSnapshot,
    pub risk_events: Vec<RiskEvent>,
    pub task_firings: Vec<TaskFiring>,
    pub daily_records: Vec<DailyRecord>,
    pub steps_processed: usize,
    pub total_steps: usize,
    pub stop_reason: StopReason,
}

impl RunResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_cash, |p| p.equity)
    }

    pub fn total_return(&self) -> f64 {
        self.final_equity() / self.initial_cash - 1.0
    }

    pub fn is_complete(&self) -> bool {
        self.stop_reason == StopReason::Completed
    }

    pub fn total_commission(&self) -> f64 {
        self.trades.iter().map(|t| t.commission).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_validation() {
        let config = EngineConfig::new(10_000.0)
            .with_execution(ExecutionTiming::NextOpen)
            .with_commission(CommissionModel::new(0.001, 1.0))
            .with_settlement(SettlementRule::NextDay);
        assert!(config.validate().is_ok());
        assert_eq!(config.execution, ExecutionTiming::NextOpen);

        assert!(EngineConfig::new(0.0).validate().is_err());
        let bad = EngineConfig::new(1.0).with_rebalance(RebalanceFrequency::EveryNWeeks(0));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn fill_price_by_timing() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let bar = Bar::new(ts, 10.0, 12.0, 9.0, 11.0, 100.0);
        assert_eq!(ExecutionTiming::CurrentClose.fill_price(&bar), 11.0);
        assert_eq!(ExecutionTiming::NextOpen.fill_price(&bar), 10.0);
    }
}
