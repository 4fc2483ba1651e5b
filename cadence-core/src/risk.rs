//! Risk module: pre- and post-trade constraints on generated orders.
//!
//! Checks run in a fixed order on the sell-first order list:
//!
//! 1. settlement lock (T+1 only): sells cannot dip into today's purchases
//! 2. per-asset weight: exposure-increasing orders are cut back to the limit
//! 3. gross leverage: increases are scaled down proportionally
//! 4. daily turnover: all orders scaled uniformly to the remaining budget
//! 5. cash: buys scaled down until projected cash is non-negative
//!
//! Every adjusted quantity is re-truncated to whole lots. An order that ends
//! up empty or below the minimum notional is dropped. Each adjustment is
//! reported as a `RiskEvent`; nothing is changed silently.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::costs::CommissionModel;
use crate::domain::position::QTY_EPSILON;
use crate::domain::{Asset, MarkBook, Order, Portfolio, TradeRecord};
use crate::error::SetupError;
use crate::rebalance::{round_to_lot, sort_orders};

/// Absolute tolerance for limit comparisons on money amounts.
const TOLERANCE: f64 = 1e-9;

/// Configured risk limits. Fractions are of total equity unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Max |position value| / equity per asset.
    pub max_asset_weight: Option<f64>,
    /// Max Σ|position value| / equity.
    pub max_gross_leverage: Option<f64>,
    /// Max traded notional per day, as a fraction of start-of-day equity.
    pub max_daily_turnover: Option<f64>,
    pub lot_size: f64,
    pub min_order_notional: f64,
    /// Stop the run once drawdown from the equity peak reaches this fraction.
    pub max_drawdown: Option<f64>,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_asset_weight: None,
            max_gross_leverage: None,
            max_daily_turnover: None,
            lot_size: 1.0,
            min_order_notional: 0.0,
            max_drawdown: None,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |msg: String| Err(SetupError::InvalidConfig(msg));

        if !self.lot_size.is_finite() || self.lot_size <= 0.0 {
            return invalid(format!("lot_size must be positive, got {}", self.lot_size));
        }
        if !self.min_order_notional.is_finite() || self.min_order_notional < 0.0 {
            return invalid(format!(
                "min_order_notional must be non-negative, got {}",
                self.min_order_notional
            ));
        }
        for (name, value) in [
            ("max_asset_weight", self.max_asset_weight),
            ("max_gross_leverage", self.max_gross_leverage),
            ("max_daily_turnover", self.max_daily_turnover),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return invalid(format!("{name} must be positive, got {v}"));
                }
            }
        }
        if let Some(dd) = self.max_drawdown {
            if dd.is_nan() || dd <= 0.0 || dd > 1.0 {
                return invalid(format!("max_drawdown must be in (0, 1], got {dd}"));
            }
        }
        Ok(())
    }
}

/// When bought quantity becomes sellable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementRule {
    /// Bought quantity can be sold on the same day.
    #[default]
    SameDay,
    /// T+1: quantity bought today is locked until the next trading day.
    NextDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    Scaled,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskReason {
    SettlementLock,
    MaxAssetWeight,
    MaxGrossLeverage,
    DailyTurnover,
    InsufficientCash,
}

/// One risk adjustment to one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub timestamp: NaiveDateTime,
    pub asset: Asset,
    pub action: RiskAction,
    pub reason: RiskReason,
    /// Quantity entering the check that adjusted it.
    pub original_quantity: f64,
    /// Quantity leaving it (0 when dropped).
    pub final_quantity: f64,
}

/// Stateful risk checker for one run.
#[derive(Debug, Clone)]
pub struct RiskManager {
    limits: RiskLimits,
    costs: CommissionModel,
    settlement: SettlementRule,
    day: Option<NaiveDate>,
    day_start_equity: f64,
    turnover_today: f64,
    /// Quantity bought today per asset (T+1 only).
    locked: BTreeMap<Asset, f64>,
    peak_equity: f64,
}

/// Portfolio state the checks measure against.
#[derive(Debug, Clone, Copy)]
pub struct RiskView<'a> {
    pub timestamp: NaiveDateTime,
    pub portfolio: &'a Portfolio,
    pub marks: &'a MarkBook,
    pub equity: f64,
}

impl RiskManager {
    pub fn new(limits: RiskLimits, costs: CommissionModel, settlement: SettlementRule) -> Self {
        Self {
            limits,
            costs,
            settlement,
            day: None,
            day_start_equity: 0.0,
            turnover_today: 0.0,
            locked: BTreeMap::new(),
            peak_equity: f64::MIN,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Reset per-day counters. `equity` is the equity entering the day.
    pub fn begin_day(&mut self, date: NaiveDate, equity: f64) {
        self.day = Some(date);
        self.day_start_equity = equity;
        self.turnover_today = 0.0;
        self.locked.clear();
    }

    pub fn current_day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub fn turnover_today(&self) -> f64 {
        self.turnover_today
    }

    pub fn locked_quantity(&self, asset: &str) -> f64 {
        self.locked.get(asset).copied().unwrap_or(0.0)
    }

    /// Update turnover and settlement locks with executed trades.
    pub fn record_trades(&mut self, trades: &[TradeRecord]) {
        for trade in trades {
            self.turnover_today += trade.notional();
            if self.settlement == SettlementRule::NextDay && trade.is_buy() {
                *self.locked.entry(trade.asset.clone()).or_default() += trade.quantity;
            }
        }
    }

    /// Track the equity peak; returns the drawdown once it reaches the limit.
    pub fn drawdown_breach(&mut self, equity: f64) -> Option<f64> {
        self.peak_equity = self.peak_equity.max(equity);
        let limit = self.limits.max_drawdown?;
        if self.peak_equity <= 0.0 {
            return None;
        }
        let drawdown = 1.0 - equity / self.peak_equity;
        (drawdown >= limit).then_some(drawdown)
    }

    /// Run every check. Returns the surviving orders and the adjustments made.
    pub fn check(&self, view: &RiskView<'_>, orders: Vec<Order>) -> (Vec<Order>, Vec<RiskEvent>) {
        let mut events = Vec::new();
        let mut orders = orders;

        if self.settlement == SettlementRule::NextDay {
            orders = self.check_settlement(view, orders, &mut events);
        }
        if let Some(max) = self.limits.max_asset_weight {
            orders = self.check_asset_weight(view, orders, max, &mut events);
        }
        if let Some(max) = self.limits.max_gross_leverage {
            orders = self.check_gross_leverage(view, orders, max, &mut events);
        }
        if let Some(max) = self.limits.max_daily_turnover {
            orders = self.check_turnover(view, orders, max, &mut events);
        }
        orders = self.check_cash(view, orders, &mut events);

        sort_orders(&mut orders);
        (orders, events)
    }

    // ─── Stages ───

    fn check_settlement(
        &self,
        view: &RiskView<'_>,
        orders: Vec<Order>,
        events: &mut Vec<RiskEvent>,
    ) -> Vec<Order> {
        orders
            .into_iter()
            .filter_map(|order| {
                if !order.is_sell() {
                    return Some(order);
                }
                let held = view.portfolio.quantity(&order.asset).max(0.0);
                let sellable = (held - self.locked_quantity(&order.asset)).max(0.0);
                if -order.quantity <= sellable + QTY_EPSILON {
                    return Some(order);
                }
                self.adjust(view, order, -sellable, RiskReason::SettlementLock, events)
            })
            .collect()
    }

    fn check_asset_weight(
        &self,
        view: &RiskView<'_>,
        orders: Vec<Order>,
        max_weight: f64,
        events: &mut Vec<RiskEvent>,
    ) -> Vec<Order> {
        orders
            .into_iter()
            .filter_map(|order| {
                let current = view.portfolio.quantity(&order.asset);
                let target = current + order.quantity;
                let increasing = target.abs() > current.abs();
                let weight = target.abs() * order.price / view.equity;
                if !increasing || weight <= max_weight + TOLERANCE {
                    return Some(order);
                }

                let limit = round_to_lot(max_weight * view.equity / order.price, self.limits.lot_size);
                let allowed = target.signum() * limit - current;
                if allowed * order.quantity <= 0.0 {
                    self.drop_order(view, &order, RiskReason::MaxAssetWeight, events);
                    return None;
                }
                self.adjust(view, order, allowed, RiskReason::MaxAssetWeight, events)
            })
            .collect()
    }

    fn check_gross_leverage(
        &self,
        view: &RiskView<'_>,
        orders: Vec<Order>,
        max_leverage: f64,
        events: &mut Vec<RiskEvent>,
    ) -> Vec<Order> {
        let mut gross_after = view.portfolio.gross_exposure(view.marks);
        let mut total_increase = 0.0;
        for order in &orders {
            let current = view.portfolio.quantity(&order.asset);
            let target = current + order.quantity;
            gross_after += (target.abs() - current.abs()) * order.price;
            if target.abs() > current.abs() {
                total_increase += (target.abs() - current.abs()) * order.price;
            }
        }

        let excess = gross_after - max_leverage * view.equity;
        if excess <= TOLERANCE || total_increase <= 0.0 {
            return orders;
        }
        let factor = ((total_increase - excess) / total_increase).max(0.0);

        orders
            .into_iter()
            .filter_map(|order| {
                let current = view.portfolio.quantity(&order.asset);
                let target = current + order.quantity;
                if target.abs() <= current.abs() {
                    return Some(order);
                }
                let scaled_abs = current.abs() + (target.abs() - current.abs()) * factor;
                let quantity = target.signum() * scaled_abs - current;
                self.adjust(view, order, quantity, RiskReason::MaxGrossLeverage, events)
            })
            .collect()
    }

    fn check_turnover(
        &self,
        view: &RiskView<'_>,
        orders: Vec<Order>,
        max_turnover: f64,
        events: &mut Vec<RiskEvent>,
    ) -> Vec<Order> {
        let budget = (max_turnover * self.day_start_equity - self.turnover_today).max(0.0);
        let total: f64 = orders.iter().map(Order::notional).sum();
        if total <= budget + TOLERANCE {
            return orders;
        }
        let factor = budget / total;

        orders
            .into_iter()
            .filter_map(|order| {
                let quantity = order.quantity * factor;
                self.adjust(view, order, quantity, RiskReason::DailyTurnover, events)
            })
            .collect()
    }

    fn check_cash(
        &self,
        view: &RiskView<'_>,
        orders: Vec<Order>,
        events: &mut Vec<RiskEvent>,
    ) -> Vec<Order> {
        let cash = view.portfolio.cash;
        let projected = |orders: &[Order]| cash + orders.iter().map(Order::cash_delta).sum::<f64>();
        if projected(&orders) >= -TOLERANCE {
            return orders;
        }

        let sells_net: f64 = orders
            .iter()
            .filter(|o| o.is_sell())
            .map(Order::cash_delta)
            .sum();
        let buys: Vec<&Order> = orders.iter().filter(|o| o.is_buy()).collect();
        let buy_cost: f64 = buys.iter().map(|o| o.notional() * (1.0 + self.costs.rate)).sum();
        let available = cash + sells_net - buys.len() as f64 * self.costs.fixed;
        let factor = if buy_cost > 0.0 {
            (available / buy_cost).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let entering: Vec<Order> = orders;
        let mut sized: Vec<Order> = entering
            .iter()
            .map(|order| {
                if !order.is_buy() {
                    return order.clone();
                }
                let quantity = self.sized_quantity(order, order.quantity * factor);
                order.with_quantity(quantity, &self.costs)
            })
            .collect();

        // Trim the last remaining buy one lot at a time until cash clears.
        while projected(&sized) < -TOLERANCE {
            let Some(last_buy) = sized.iter().rposition(Order::is_buy) else {
                break;
            };
            let order = &sized[last_buy];
            let quantity = self.sized_quantity(order, order.quantity - self.limits.lot_size);
            // A zeroed order pays no commission and stops counting as a buy.
            sized[last_buy] = order.with_quantity(quantity, &self.costs);
        }

        entering
            .into_iter()
            .zip(sized)
            .filter_map(|(before, after)| {
                if !before.is_buy() {
                    return Some(before);
                }
                let quantity = after.quantity;
                self.adjust(view, before, quantity, RiskReason::InsufficientCash, events)
            })
            .collect()
    }

    // ─── Helpers ───

    /// Lot-round toward zero and zero out anything below the minimum notional.
    fn sized_quantity(&self, order: &Order, quantity: f64) -> f64 {
        let rounded = round_to_lot(quantity, self.limits.lot_size);
        if rounded.abs() < QTY_EPSILON
            || rounded.signum() != order.quantity.signum()
            || rounded.abs() * order.price < self.limits.min_order_notional
        {
            0.0
        } else {
            rounded
        }
    }

    /// Resize `order` to `quantity`, recording the change.
    fn adjust(
        &self,
        view: &RiskView<'_>,
        order: Order,
        quantity: f64,
        reason: RiskReason,
        events: &mut Vec<RiskEvent>,
    ) -> Option<Order> {
        let sized = self.sized_quantity(&order, quantity);
        if sized == 0.0 {
            self.drop_order(view, &order, reason, events);
            return None;
        }
        if (sized - order.quantity).abs() < QTY_EPSILON {
            return Some(order);
        }
        let event = RiskEvent {
            timestamp: view.timestamp,
            asset: order.asset.clone(),
            action: RiskAction::Scaled,
            reason,
            original_quantity: order.quantity,
            final_quantity: sized,
        };
        warn!(
            asset = %event.asset,
            reason = ?reason,
            from = event.original_quantity,
            to = sized,
            "order scaled"
        );
        events.push(event);
        Some(order.with_quantity(sized, &self.costs))
    }

    fn drop_order(
        &self,
        view: &RiskView<'_>,
        order: &Order,
        reason: RiskReason,
        events: &mut Vec<RiskEvent>,
    ) {
        warn!(asset = %order.asset, reason = ?reason, quantity = order.quantity, "order dropped");
        events.push(RiskEvent {
            timestamp: view.timestamp,
            asset: order.asset.clone(),
            action: RiskAction::Dropped,
            reason,
            original_quantity: order.quantity,
            final_quantity: 0.0,
        });
    }
}
