//! Portfolio: aggregate state of cash + all open positions.

use super::position::Position;
use super::Asset;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mark price per asset (last known close, carried forward across gaps).
pub type MarkBook = BTreeMap<Asset, f64>;

/// Aggregate portfolio state.
///
/// The single source of truth for money. The accounting identity must hold at
/// every step: `equity == cash + sum(quantity * mark)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub positions: BTreeMap<Asset, Position>,
    pub realized_pnl: f64,
    pub total_commission: f64,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            initial_cash,
            positions: BTreeMap::new(),
            realized_pnl: 0.0,
            total_commission: 0.0,
        }
    }

    /// Mark price for an asset; falls back to average cost if never marked.
    fn mark_for(&self, asset: &str, pos: &Position, marks: &MarkBook) -> f64 {
        marks.get(asset).copied().unwrap_or(pos.avg_cost)
    }

    /// Sum of position market values.
    pub fn positions_value(&self, marks: &MarkBook) -> f64 {
        self.positions
            .iter()
            .map(|(asset, pos)| pos.market_value(self.mark_for(asset, pos, marks)))
            .sum()
    }

    /// Sum of absolute position market values.
    pub fn gross_exposure(&self, marks: &MarkBook) -> f64 {
        self.positions
            .iter()
            .map(|(asset, pos)| pos.market_value(self.mark_for(asset, pos, marks)).abs())
            .sum()
    }

    /// Total equity = cash + sum of all position market values.
    pub fn equity(&self, marks: &MarkBook) -> f64 {
        self.cash + self.positions_value(marks)
    }

    /// Signed quantity held (0.0 when flat).
    pub fn quantity(&self, asset: &str) -> f64 {
        self.positions.get(asset).map_or(0.0, |p| p.quantity)
    }

    pub fn has_position(&self, asset: &str) -> bool {
        self.positions.get(asset).is_some_and(|p| !p.is_flat())
    }

    pub fn get_position(&self, asset: &str) -> Option<&Position> {
        self.positions.get(asset).filter(|p| !p.is_flat())
    }

    /// Read-only valuation of the portfolio at the given marks.
    pub fn snapshot(&self, timestamp: NaiveDateTime, marks: &MarkBook) -> PortfolioSnapshot {
        let positions = self
            .positions
            .iter()
            .map(|(asset, pos)| {
                let mark = self.mark_for(asset, pos, marks);
                (
                    asset.clone(),
                    PositionSnapshot {
                        quantity: pos.quantity,
                        avg_cost: pos.avg_cost,
                        mark,
                        market_value: pos.market_value(mark),
                    },
                )
            })
            .collect();

        PortfolioSnapshot {
            timestamp,
            cash: self.cash,
            positions,
            equity: self.equity(marks),
        }
    }
}

/// Valued view of one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub quantity: f64,
    pub avg_cost: f64,
    pub mark: f64,
    pub market_value: f64,
}

/// Immutable copy of the portfolio handed to callbacks and returned at the end
/// of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub positions: BTreeMap<Asset, PositionSnapshot>,
    pub equity: f64,
}

impl PortfolioSnapshot {
    pub fn quantity(&self, asset: &str) -> f64 {
        self.positions.get(asset).map_or(0.0, |p| p.quantity)
    }

    /// Current weight of an asset as a fraction of equity.
    pub fn weight(&self, asset: &str) -> f64 {
        if self.equity <= 0.0 {
            return 0.0;
        }
        self.positions
            .get(asset)
            .map_or(0.0, |p| p.market_value / self.equity)
    }
}
