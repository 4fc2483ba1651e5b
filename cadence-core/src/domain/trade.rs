//! TradeRecord: one executed order in the trade log.

use super::Asset;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An executed order. Quantity is signed (positive = bought).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: NaiveDateTime,
    pub asset: Asset,
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
    /// PnL realized by the part of this trade that reduced an existing position.
    pub realized_pnl: f64,
}

impl TradeRecord {
    pub fn notional(&self) -> f64 {
        self.quantity.abs() * self.price
    }

    pub fn is_buy(&self) -> bool {
        self.quantity > 0.0
    }
}
