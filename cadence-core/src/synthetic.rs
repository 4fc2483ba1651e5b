//! Deterministic synthetic bars for tests, benchmarks and sweep demos.
//!
//! A seeded random walk (`StdRng`): the same seed always produces the same
//! bars. Each asset of a universe gets its own stream derived from the seed
//! and the asset's position, so adding an asset does not perturb the others.

use chrono::{Duration, NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::calendar::Session;
use crate::domain::{Asset, Bar};

/// Random-walk parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    pub start_price: f64,
    /// Maximum absolute per-bar return. Keep well below 1.
    pub volatility: f64,
    /// Constant per-bar return added to every step.
    pub drift: f64,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            start_price: 100.0,
            volatility: 0.002,
            drift: 0.0,
        }
    }
}

struct Walk {
    rng: StdRng,
    params: WalkParams,
    last_close: f64,
}

impl Walk {
    fn new(seed: u64, params: WalkParams) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            params,
            last_close: params.start_price,
        }
    }

    fn bar(&mut self, timestamp: chrono::NaiveDateTime) -> Bar {
        let vol = self.params.volatility;
        let open = self.last_close;
        let ret = self.params.drift + vol * self.rng.gen_range(-1.0..=1.0);
        let close = open * (1.0 + ret);
        let high = open.max(close) * (1.0 + vol * self.rng.gen_range(0.0..=0.5));
        let low = open.min(close) * (1.0 - vol * self.rng.gen_range(0.0..=0.5));
        let volume = self.rng.gen_range(1_000.0..10_000.0_f64).round();
        self.last_close = close;
        Bar::new(timestamp, open, high, low, close, volume)
    }
}

/// One bar per minute from session open to close (inclusive) on each date.
pub fn minute_bars(seed: u64, dates: &[NaiveDate], session: Session, params: WalkParams) -> Vec<Bar> {
    let mut walk = Walk::new(seed, params);
    let mut bars = Vec::new();
    for date in dates {
        let mut time = session.open;
        loop {
            bars.push(walk.bar(date.and_time(time)));
            let next = time + Duration::minutes(1);
            if next > session.close || next <= time {
                break;
            }
            time = next;
        }
    }
    bars
}

/// One bar per date, stamped at `at`.
pub fn daily_bars(seed: u64, dates: &[NaiveDate], at: NaiveTime, params: WalkParams) -> Vec<Bar> {
    let mut walk = Walk::new(seed, params);
    dates.iter().map(|d| walk.bar(d.and_time(at))).collect()
}

/// Minute bars for several assets, keyed for `Timeline::align`.
pub fn minute_universe(
    seed: u64,
    assets: &[&str],
    dates: &[NaiveDate],
    session: Session,
    params: WalkParams,
) -> BTreeMap<Asset, Vec<Bar>> {
    assets
        .iter()
        .enumerate()
        .map(|(i, asset)| {
            let asset_seed = seed.wrapping_add((i as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            (asset.to_string(), minute_bars(asset_seed, dates, session, params))
        })
        .collect()
}

/// Weekdays from `start`, `count` of them.
pub fn weekdays(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    use chrono::{Datelike, Weekday};
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .collect()
}
