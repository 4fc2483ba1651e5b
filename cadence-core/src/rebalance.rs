//! Rebalance: target weights to discrete, lot-rounded orders.
//!
//! `target_qty = trunc(weight × equity / price, lot)`, `order_qty = target − current`.
//! Orders come out sell-first (signed quantity ascending, ties by asset) so
//! sell proceeds are on hand before buys are checked against cash.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::costs::CommissionModel;
use crate::domain::position::QTY_EPSILON;
use crate::domain::{Asset, Order, Portfolio};
use crate::error::SetupError;
use crate::strategy::TargetWeights;

/// Truncate a quantity toward zero to a whole number of lots.
///
/// A tiny nudge away from zero absorbs float noise such as
/// `0.3 / 0.1 = 2.9999999999999996`.
pub fn round_to_lot(quantity: f64, lot_size: f64) -> f64 {
    if quantity == 0.0 || lot_size <= 0.0 {
        return quantity;
    }
    let lots = (quantity / lot_size + quantity.signum() * 1e-9).trunc();
    lots * lot_size
}

/// Sell-before-buy execution order.
pub fn sort_orders(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        a.quantity
            .total_cmp(&b.quantity)
            .then_with(|| a.asset.cmp(&b.asset))
    });
}

/// Order sizing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Rebalancer {
    pub lot_size: f64,
    pub min_order_notional: f64,
    pub costs: CommissionModel,
}

impl Rebalancer {
    pub fn new(lot_size: f64, min_order_notional: f64, costs: CommissionModel) -> Self {
        Self {
            lot_size,
            min_order_notional,
            costs,
        }
    }

    /// Orders that move `portfolio` toward `weights`.
    ///
    /// `prices` holds the execution price of every asset tradable this step;
    /// assets missing from it are left alone. Held assets absent from
    /// `weights` are closed. Weights for assets outside `universe` are
    /// ignored.
    pub fn orders(
        &self,
        weights: &TargetWeights,
        portfolio: &Portfolio,
        equity: f64,
        prices: &BTreeMap<Asset, f64>,
        universe: &BTreeSet<Asset>,
    ) -> Vec<Order> {
        let mut candidates: BTreeSet<&Asset> = weights.keys().collect();
        candidates.extend(
            portfolio
                .positions
                .iter()
                .filter(|(_, p)| !p.is_flat())
                .map(|(a, _)| a),
        );

        let mut orders = Vec::new();
        for asset in candidates {
            if !universe.contains(asset) {
                warn!(asset = %asset, "target weight for unknown asset ignored");
                continue;
            }
            let Some(&price) = prices.get(asset) else {
                continue;
            };
            let weight = weights.get(asset).copied().unwrap_or(0.0);
            if !weight.is_finite() {
                warn!(asset = %asset, weight, "non-finite target weight ignored");
                continue;
            }

            let target = round_to_lot(weight * equity / price, self.lot_size);
            let quantity = target - portfolio.quantity(asset);
            if quantity.abs() < QTY_EPSILON {
                continue;
            }
            let notional = quantity.abs() * price;
            if notional < self.min_order_notional {
                debug!(asset = %asset, quantity, notional, "order below minimum notional skipped");
                continue;
            }
            orders.push(Order::new(asset.clone(), quantity, price, &self.costs));
        }

        sort_orders(&mut orders);
        orders
    }
}

/// How often target weights are turned into orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    #[default]
    EveryStep,
    EveryNDays(u32),
    EveryNWeeks(u32),
    EveryNMonths(u32),
}

impl RebalanceFrequency {
    pub fn validate(&self) -> Result<(), SetupError> {
        match self {
            RebalanceFrequency::EveryNDays(0)
            | RebalanceFrequency::EveryNWeeks(0)
            | RebalanceFrequency::EveryNMonths(0) => Err(SetupError::InvalidConfig(
                "rebalance interval must be at least 1".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Tracks the last rebalance date against a `RebalanceFrequency`.
#[derive(Debug, Clone)]
pub struct RebalanceGate {
    frequency: RebalanceFrequency,
    last: Option<NaiveDate>,
}

impl RebalanceGate {
    pub fn new(frequency: RebalanceFrequency) -> Self {
        Self {
            frequency,
            last: None,
        }
    }

    pub fn is_open(&self, date: NaiveDate) -> bool {
        let Some(last) = self.last else {
            return true;
        };
        let days = (date - last).num_days();
        match self.frequency {
            RebalanceFrequency::EveryStep => true,
            RebalanceFrequency::EveryNDays(n) => days >= i64::from(n),
            RebalanceFrequency::EveryNWeeks(n) => days / 7 >= i64::from(n),
            RebalanceFrequency::EveryNMonths(n) => {
                let months = (date.year() - last.year()) * 12 + date.month() as i32
                    - last.month() as i32;
                i64::from(months) >= i64::from(n)
            }
        }
    }

    pub fn mark(&mut self, date: NaiveDate) {
        self.last = Some(date);
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.last
    }
}
