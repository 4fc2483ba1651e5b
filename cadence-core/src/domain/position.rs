use serde::{Deserialize, Serialize};

/// Quantities with magnitude below this are treated as flat.
pub const QTY_EPSILON: f64 = 1e-9;

/// Open position in one asset. Quantity is signed (negative = short).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    /// Volume-weighted average cost of the open quantity.
    pub avg_cost: f64,
}

impl Position {
    pub fn new(quantity: f64, avg_cost: f64) -> Self {
        Self { quantity, avg_cost }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > QTY_EPSILON
    }

    pub fn is_short(&self) -> bool {
        self.quantity < -QTY_EPSILON
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.abs() <= QTY_EPSILON
    }

    pub fn market_value(&self, mark_price: f64) -> f64 {
        self.quantity * mark_price
    }

    pub fn unrealized_pnl(&self, mark_price: f64) -> f64 {
        self.quantity * (mark_price - self.avg_cost)
    }
}
