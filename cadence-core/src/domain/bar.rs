//! Bar: the fundamental market data unit.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single asset at a single timestamp.
///
/// Timestamps are exchange-local wall-clock time. The trading day of a bar is
/// the date part of its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A bar whose four prices are all `price`.
    pub fn flat(timestamp: NaiveDateTime, price: f64, volume: f64) -> Self {
        Self::new(timestamp, price, price, price, price, volume)
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Why this bar cannot be used for pricing, if anything is wrong with it.
    pub fn defect(&self) -> Option<&'static str> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) || !self.volume.is_finite() {
            return Some("non-finite field");
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Some("non-positive price");
        }
        if self.high < self.low {
            return Some("high below low");
        }
        if self.volume < 0.0 {
            return Some("negative volume");
        }
        None
    }

    pub fn is_sane(&self) -> bool {
        self.defect().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 31, 0)
            .unwrap();
        Bar::new(ts, 100.0, 105.0, 98.0, 103.0, 50_000.0)
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_nan() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert_eq!(bar.defect(), Some("non-finite field"));
    }

    #[test]
    fn bar_detects_inverted_range() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert_eq!(bar.defect(), Some("high below low"));
    }

    #[test]
    fn bar_detects_zero_price() {
        let mut bar = sample_bar();
        bar.close = 0.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn date_and_time_split() {
        let bar = sample_bar();
        assert_eq!(bar.date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bar.time(), NaiveTime::from_hms_opt(9, 31, 0).unwrap());
    }
}
