//! Performance metrics: pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve, daily records or trade log
//! in, scalar out. No dependencies on the sweep, export or logging modules.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use cadence_core::engine::{DailyRecord, EquityPoint, RunResult};
use cadence_core::TradeRecord;

/// Trading days per year used for annualization.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    /// Worst peak-to-trough decline, `None` when equity never fell.
    pub max_drawdown: Option<Drawdown>,
    pub annualized_volatility: f64,
    pub sharpe: f64,
    pub trade_count: usize,
    pub total_commission: f64,
    pub turnover: f64,
}

/// A peak-to-trough decline of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Negative fraction of the peak (-0.15 = 15% drawdown).
    pub depth: f64,
    pub peak: NaiveDateTime,
    pub trough: NaiveDateTime,
    /// Calendar days from peak to trough.
    pub duration_days: i64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a run result.
    pub fn compute(result: &RunResult) -> Self {
        let returns = daily_returns(&result.daily_records);
        Self {
            total_return: total_return(result.initial_cash, &result.equity_curve),
            max_drawdown: max_drawdown(&result.equity_curve),
            annualized_volatility: annualized_volatility(&returns),
            sharpe: sharpe_ratio(&returns, 0.0),
            trade_count: result.trades.len(),
            total_commission: total_commission(&result.trades),
            turnover: turnover(&result.trades, &result.equity_curve),
        }
    }

    /// Drawdown depth as a plain number (0.0 when there was none).
    pub fn max_drawdown_depth(&self) -> f64 {
        self.max_drawdown.map_or(0.0, |d| d.depth)
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction of initial cash.
pub fn total_return(initial_cash: f64, equity_curve: &[EquityPoint]) -> f64 {
    let Some(last) = equity_curve.last() else {
        return 0.0;
    };
    if initial_cash <= 0.0 {
        return 0.0;
    }
    (last.equity - initial_cash) / initial_cash
}

/// Largest peak-to-trough decline over the equity curve.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> Option<Drawdown> {
    let first = equity_curve.first()?;
    let mut peak = *first;
    let mut worst: Option<Drawdown> = None;

    for point in equity_curve {
        if point.equity > peak.equity {
            peak = *point;
            continue;
        }
        if peak.equity <= 0.0 {
            continue;
        }
        let depth = (point.equity - peak.equity) / peak.equity;
        if depth < worst.map_or(0.0, |w| w.depth) {
            worst = Some(Drawdown {
                depth,
                peak: peak.timestamp,
                trough: point.timestamp,
                duration_days: (point.timestamp.date() - peak.timestamp.date()).num_days(),
            });
        }
    }
    worst
}

/// Annualized standard deviation of daily returns.
pub fn annualized_volatility(daily_returns: &[f64]) -> f64 {
    std_dev(daily_returns) * PERIODS_PER_YEAR.sqrt()
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or there are fewer than 2 days.
pub fn sharpe_ratio(daily_returns: &[f64], risk_free_rate: f64) -> f64 {
    if daily_returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / PERIODS_PER_YEAR;
    let excess: Vec<f64> = daily_returns.iter().map(|r| r - daily_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / std * PERIODS_PER_YEAR.sqrt()
}

pub fn total_commission(trades: &[TradeRecord]) -> f64 {
    trades.iter().map(|t| t.commission).sum()
}

/// Total traded notional divided by average equity.
pub fn turnover(trades: &[TradeRecord], equity_curve: &[EquityPoint]) -> f64 {
    let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    let average = mean_f64(&equity);
    if trades.is_empty() || average <= 0.0 {
        return 0.0;
    }
    trades.iter().map(TradeRecord::notional).sum::<f64>() / average
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn daily_returns(records: &[DailyRecord]) -> Vec<f64> {
    records.iter().map(|r| r.daily_return).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: at(i as u32 + 1),
                equity,
                cash: equity,
            })
            .collect()
    }

    fn trade(quantity: f64, price: f64, commission: f64) -> TradeRecord {
        TradeRecord {
            timestamp: at(1),
            asset: "AAA".into(),
            quantity,
            price,
            commission,
            realized_pnl: 0.0,
        }
    }

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let eq = curve(&[100_500.0, 101_000.0, 110_000.0]);
        assert!((total_return(100_000.0, &eq) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_empty() {
        assert_eq!(total_return(100_000.0, &[]), 0.0);
    }

    // ── Max drawdown ──

    #[test]
    fn max_drawdown_known() {
        let eq = curve(&[100_000.0, 110_000.0, 90_000.0, 95_000.0, 80_000.0, 120_000.0]);
        let dd = max_drawdown(&eq).unwrap();
        let expected = (80_000.0 - 110_000.0) / 110_000.0;
        assert!((dd.depth - expected).abs() < 1e-10);
        assert_eq!(dd.peak, at(2));
        assert_eq!(dd.trough, at(5));
        assert_eq!(dd.duration_days, 3);
    }

    #[test]
    fn max_drawdown_monotonic_increase() {
        let values: Vec<f64> = (0..20).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(max_drawdown(&curve(&values)), None);
    }

    #[test]
    fn max_drawdown_empty() {
        assert_eq!(max_drawdown(&[]), None);
    }

    // ── Volatility and Sharpe ──

    #[test]
    fn sharpe_constant_return_is_zero() {
        assert_eq!(sharpe_ratio(&[0.01; 10], 0.0), 0.0);
        assert_eq!(annualized_volatility(&[0.01; 10]), 0.0);
    }

    #[test]
    fn sharpe_known_returns() {
        let returns = [0.01, -0.005, 0.02, 0.0];
        let mean = 0.00625;
        let std = std_dev(&returns);
        let expected = mean / std * 252.0_f64.sqrt();
        assert!((sharpe_ratio(&returns, 0.0) - expected).abs() < 1e-10);
        assert!((annualized_volatility(&returns) - std * 252.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn sharpe_single_day() {
        assert_eq!(sharpe_ratio(&[0.05], 0.0), 0.0);
    }

    // ── Trades ──

    #[test]
    fn turnover_and_commission() {
        let trades = vec![trade(100.0, 50.0, 1.0), trade(-40.0, 55.0, 1.5)];
        let eq = curve(&[10_000.0, 10_000.0]);
        // (5000 + 2200) / 10000
        assert!((turnover(&trades, &eq) - 0.72).abs() < 1e-12);
        assert_eq!(total_commission(&trades), 2.5);
    }

    #[test]
    fn turnover_without_trades_is_zero() {
        assert_eq!(turnover(&[], &curve(&[1.0, 2.0])), 0.0);
    }
}
