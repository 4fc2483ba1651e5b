use serde::{Deserialize, Serialize};

use crate::costs::CommissionModel;
use crate::domain::Asset;

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A discrete order produced by the rebalancer.
///
/// Quantity is signed: positive buys, negative sells. Orders are ephemeral and
/// are consumed by the accountant within the step that created them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub asset: Asset,
    pub quantity: f64,
    /// Reference (execution) price for this step.
    pub price: f64,
    pub commission: f64,
}

impl Order {
    pub fn new(asset: Asset, quantity: f64, price: f64, costs: &CommissionModel) -> Self {
        let commission = costs.commission(quantity.abs() * price);
        Self {
            asset,
            quantity,
            price,
            commission,
        }
    }

    /// Same asset and price with a new quantity; commission is recomputed.
    pub fn with_quantity(&self, quantity: f64, costs: &CommissionModel) -> Self {
        Self::new(self.asset.clone(), quantity, self.price, costs)
    }

    pub fn side(&self) -> OrderSide {
        if self.quantity >= 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn is_buy(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_sell(&self) -> bool {
        self.quantity < 0.0
    }

    /// Absolute traded value, excluding commission.
    pub fn notional(&self) -> f64 {
        self.quantity.abs() * self.price
    }

    /// Change in cash if this order executes: sells add proceeds, buys pay cost.
    /// Commission is always paid.
    pub fn cash_delta(&self) -> f64 {
        -self.quantity * self.price - self.commission
    }
}
