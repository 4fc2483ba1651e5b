//! Trading calendar boundary.
//!
//! The engine only asks two questions of a calendar: is this date a trading
//! day, and what are its session hours. Where the calendar data comes from is
//! the caller's business. Two in-memory adapters are provided.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Regular session hours for one trading day (exchange-local, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Session {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    /// Session from "HH:MM" strings. Returns `None` if either is malformed.
    pub fn parse(open: &str, close: &str) -> Option<Self> {
        let open = NaiveTime::parse_from_str(open, "%H:%M").ok()?;
        let close = NaiveTime::parse_from_str(close, "%H:%M").ok()?;
        Some(Self::new(open, close))
    }

    /// A session spanning the whole day.
    pub fn all_day() -> Self {
        Self::new(
            NaiveTime::default(),
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default(),
        )
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time <= self.close
    }
}

/// Valid-trading-day queries consumed by the simulation loop.
pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// Session hours, or `None` on non-trading days.
    fn session(&self, date: NaiveDate) -> Option<Session>;
}

/// Monday–Friday calendar with an optional holiday list.
#[derive(Debug, Clone)]
pub struct WeekdayCalendar {
    session: Session,
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            holidays: BTreeSet::new(),
        }
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }
}

impl Default for WeekdayCalendar {
    fn default() -> Self {
        Self::new(Session::all_day())
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    fn session(&self, date: NaiveDate) -> Option<Session> {
        self.is_trading_day(date).then_some(self.session)
    }
}

/// Calendar backed by an explicit set of trading dates.
#[derive(Debug, Clone)]
pub struct StaticCalendar {
    days: BTreeSet<NaiveDate>,
    session: Session,
}

impl StaticCalendar {
    pub fn new(days: impl IntoIterator<Item = NaiveDate>, session: Session) -> Self {
        Self {
            days: days.into_iter().collect(),
            session,
        }
    }

    pub fn trading_days(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.iter()
    }

    /// First trading day strictly after `date`.
    pub fn next_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.days.range(date.succ_opt()?..).next().copied()
    }

    /// Last trading day strictly before `date`.
    pub fn prev_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.days.range(..date).next_back().copied()
    }
}

impl TradingCalendar for StaticCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.days.contains(&date)
    }

    fn session(&self, date: NaiveDate) -> Option<Session> {
        self.is_trading_day(date).then_some(self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekday_calendar_skips_weekends_and_holidays() {
        let cal = WeekdayCalendar::default().with_holidays([d(2024, 1, 1)]);
        assert!(!cal.is_trading_day(d(2024, 1, 1))); // holiday (Monday)
        assert!(cal.is_trading_day(d(2024, 1, 2)));
        assert!(!cal.is_trading_day(d(2024, 1, 6))); // Saturday
        assert!(cal.session(d(2024, 1, 6)).is_none());
    }

    #[test]
    fn static_calendar_neighbours() {
        let cal = StaticCalendar::new(
            [d(2024, 1, 2), d(2024, 1, 4), d(2024, 1, 5)],
            Session::all_day(),
        );
        assert!(!cal.is_trading_day(d(2024, 1, 3)));
        assert_eq!(cal.next_trading_day(d(2024, 1, 2)), Some(d(2024, 1, 4)));
        assert_eq!(cal.prev_trading_day(d(2024, 1, 4)), Some(d(2024, 1, 2)));
        assert_eq!(cal.next_trading_day(d(2024, 1, 5)), None);
    }

    #[test]
    fn session_bounds_are_inclusive() {
        let session = Session::parse("09:30", "15:00").unwrap();
        assert!(session.contains(NaiveTime::from_hms_opt(9, 30, 0).unwrap()));
        assert!(session.contains(NaiveTime::from_hms_opt(15, 0, 0).unwrap()));
        assert!(!session.contains(NaiveTime::from_hms_opt(15, 1, 0).unwrap()));
        assert!(Session::parse("9h30", "15:00").is_none());
    }
}
