use chrono::{NaiveDate, TimeZone, Utc};
use hermes_core::Timestamp;
use parking_lot::RwLock;

use crate::Clock;

/// Clock pinned to a settable instant
///
/// `today()` reports the pinned UTC date rather than the local one so tests
/// behave the same on every host.
pub struct FixedClock {
    now: RwLock<Timestamp>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Clock pinned to midday UTC of the given date
    pub fn on(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        Self::new(Utc.from_utc_datetime(&noon))
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.write() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn name(&self) -> &str {
        "FixedClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_reports_pinned_date() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 15).unwrap();
        let clock = FixedClock::on(date);
        assert_eq!(clock.today(), date);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_fixed_clock_can_be_moved() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        let later = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        clock.set(Utc.from_utc_datetime(&later.and_hms_opt(1, 0, 0).unwrap()));
        assert_eq!(clock.today(), later);
    }
}
