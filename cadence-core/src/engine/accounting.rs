//! Portfolio accountant: applies a step's orders as one atomic commit.
//!
//! All orders of a step are applied to a staging copy of the portfolio. Only
//! when every order has applied cleanly does the copy replace the committed
//! portfolio. A fault leaves the committed portfolio untouched.

use chrono::NaiveDateTime;

use crate::domain::position::QTY_EPSILON;
use crate::domain::{MarkBook, Order, Portfolio, Position, TradeRecord};
use crate::error::ArithmeticFault;

impl Portfolio {
    /// Apply `orders` in sequence, all or nothing.
    pub fn apply(
        &mut self,
        timestamp: NaiveDateTime,
        orders: &[Order],
    ) -> Result<Vec<TradeRecord>, ArithmeticFault> {
        let mut staged = self.clone();
        let mut trades = Vec::with_capacity(orders.len());

        for order in orders {
            trades.push(staged.apply_order(timestamp, order)?);
        }

        if !staged.cash.is_finite() {
            return Err(ArithmeticFault::NonFinite {
                timestamp,
                what: "cash".into(),
            });
        }

        *self = staged;
        Ok(trades)
    }

    fn apply_order(
        &mut self,
        timestamp: NaiveDateTime,
        order: &Order,
    ) -> Result<TradeRecord, ArithmeticFault> {
        let fields = [order.quantity, order.price, order.commission];
        if fields.iter().any(|v| !v.is_finite()) || order.price <= 0.0 {
            return Err(ArithmeticFault::NonFinite {
                timestamp,
                what: format!("order for {}", order.asset),
            });
        }

        let current = self.quantity(&order.asset);
        let avg_cost = self.positions.get(&order.asset).map_or(0.0, |p| p.avg_cost);
        let new_quantity = current + order.quantity;

        let mut realized = 0.0;
        let new_avg = if current.abs() < QTY_EPSILON || current.signum() == order.quantity.signum() {
            // Opening or adding: volume-weighted average.
            (current.abs() * avg_cost + order.quantity.abs() * order.price) / new_quantity.abs()
        } else {
            // Reducing, closing, or flipping.
            let closed = order.quantity.abs().min(current.abs());
            realized = (order.price - avg_cost) * closed * current.signum();
            if order.quantity.abs() > current.abs() + QTY_EPSILON {
                order.price
            } else {
                avg_cost
            }
        };

        self.cash += order.cash_delta();
        self.realized_pnl += realized;
        self.total_commission += order.commission;

        if new_quantity.abs() < QTY_EPSILON {
            self.positions.remove(&order.asset);
        } else {
            self.positions
                .insert(order.asset.clone(), Position::new(new_quantity, new_avg));
        }

        Ok(TradeRecord {
            timestamp,
            asset: order.asset.clone(),
            quantity: order.quantity,
            price: order.price,
            commission: order.commission,
            realized_pnl: realized,
        })
    }
}

/// Equity at `marks`, checking the accounting identity in debug builds.
pub fn verify_equity(portfolio: &Portfolio, marks: &MarkBook) -> f64 {
    let equity = portfolio.equity(marks);

    #[cfg(debug_assertions)]
    {
        let position_value: f64 = portfolio
            .positions
            .iter()
            .map(|(asset, pos)| {
                let mark = marks.get(asset).copied().unwrap_or(pos.avg_cost);
                pos.quantity * mark
            })
            .sum();
        let expected = portfolio.cash + position_value;
        assert!(
            (equity - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "equity accounting violated: equity={equity}, cash={} + positions={position_value} = {expected}",
            portfolio.cash
        );
    }

    equity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::CommissionModel;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn order(asset: &str, quantity: f64, price: f64) -> Order {
        Order::new(asset.into(), quantity, price, &CommissionModel::zero())
    }

    #[test]
    fn buy_opens_long_and_pays_cash() {
        let mut portfolio = Portfolio::new(100_000.0);
        let costs = CommissionModel::new(0.0, 5.0);
        let trades = portfolio
            .apply(ts(), &[Order::new("AAA".into(), 50.0, 100.0, &costs)])
            .unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(portfolio.cash, 94_995.0);
        assert_eq!(portfolio.quantity("AAA"), 50.0);
        assert_eq!(portfolio.total_commission, 5.0);
    }

    #[test]
    fn adding_averages_cost() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio
            .apply(ts(), &[order("AAA", 100.0, 100.0), order("AAA", 100.0, 110.0)])
            .unwrap();
        let pos = portfolio.get_position("AAA").unwrap();
        assert_eq!(pos.quantity, 200.0);
        assert!((pos.avg_cost - 105.0).abs() < 1e-12);
    }

    #[test]
    fn reducing_keeps_cost_and_realizes() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply(ts(), &[order("AAA", 100.0, 100.0)]).unwrap();
        let trades = portfolio.apply(ts(), &[order("AAA", -40.0, 110.0)]).unwrap();

        assert_eq!(trades[0].realized_pnl, 400.0);
        let pos = portfolio.get_position("AAA").unwrap();
        assert_eq!(pos.quantity, 60.0);
        assert_eq!(pos.avg_cost, 100.0);
        assert_eq!(portfolio.realized_pnl, 400.0);
    }

    #[test]
    fn closing_removes_position() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply(ts(), &[order("AAA", 50.0, 100.0)]).unwrap();
        portfolio.apply(ts(), &[order("AAA", -50.0, 110.0)]).unwrap();

        assert!(!portfolio.has_position("AAA"));
        assert!((portfolio.cash - 100_500.0).abs() < 1e-10);
    }

    #[test]
    fn flipping_opens_remainder_at_fill_price() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply(ts(), &[order("AAA", 100.0, 100.0)]).unwrap();
        let trades = portfolio.apply(ts(), &[order("AAA", -150.0, 90.0)]).unwrap();

        assert_eq!(trades[0].realized_pnl, -1_000.0);
        let pos = portfolio.get_position("AAA").unwrap();
        assert_eq!(pos.quantity, -50.0);
        assert_eq!(pos.avg_cost, 90.0);
    }

    #[test]
    fn short_cover_realizes_gain() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply(ts(), &[order("AAA", -10.0, 50.0)]).unwrap();
        assert_eq!(portfolio.cash, 10_500.0);
        let trades = portfolio.apply(ts(), &[order("AAA", 10.0, 40.0)]).unwrap();
        assert_eq!(trades[0].realized_pnl, 100.0);
        assert_eq!(portfolio.cash, 10_100.0);
    }

    #[test]
    fn fault_leaves_portfolio_untouched() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply(ts(), &[order("AAA", 10.0, 100.0)]).unwrap();
        let before = portfolio.clone();

        let bad = Order {
            asset: "BBB".into(),
            quantity: 5.0,
            price: f64::NAN,
            commission: 0.0,
        };
        let result = portfolio.apply(ts(), &[order("AAA", 10.0, 100.0), bad]);

        assert!(matches!(result, Err(ArithmeticFault::NonFinite { .. })));
        assert_eq!(portfolio, before);
    }

    #[test]
    fn identity_holds_after_trades() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio
            .apply(ts(), &[order("AAA", 100.0, 100.0), order("BBB", -20.0, 50.0)])
            .unwrap();
        let mut marks = MarkBook::new();
        marks.insert("AAA".into(), 105.0);
        marks.insert("BBB".into(), 45.0);
        let equity = verify_equity(&portfolio, &marks);
        // 100_000 - 10_000 + 1_000 + 10_500 - 900
        assert!((equity - 100_600.0).abs() < 1e-9);
    }
}
