//! Simulation clock: the only authority for "now".

use chrono::NaiveDateTime;

/// Current timeline position. Only ever moves forward.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    position: Option<(usize, NaiveDateTime)>,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next timeline position and return the new "now".
    pub fn advance(&mut self, index: usize, timestamp: NaiveDateTime) -> NaiveDateTime {
        debug_assert!(
            self.position
                .map_or(true, |(i, t)| index > i && timestamp > t),
            "clock moved backwards: {:?} -> ({index}, {timestamp})",
            self.position
        );
        self.position = Some((index, timestamp));
        timestamp
    }

    pub fn index(&self) -> Option<usize> {
        self.position.map(|(i, _)| i)
    }

    pub fn now(&self) -> Option<NaiveDateTime> {
        self.position.map(|(_, t)| t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn starts_unset_and_advances() {
        let mut clock = SimulationClock::new();
        assert!(clock.now().is_none());
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(clock.advance(0, ts), ts);
        assert_eq!(clock.index(), Some(0));
        assert_eq!(clock.now(), Some(ts));
    }

    #[test]
    #[should_panic(expected = "clock moved backwards")]
    #[cfg(debug_assertions)]
    fn refuses_to_go_backwards() {
        let mut clock = SimulationClock::new();
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        clock.advance(1, ts);
        clock.advance(0, ts);
    }
}
