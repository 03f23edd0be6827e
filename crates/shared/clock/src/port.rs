use chrono::{Local, NaiveDate, Utc};
use hermes_core::Timestamp;

/// Source of "now" for contract-month selection and daily file names
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Calendar date in the local timezone, used for contract months
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }

    fn name(&self) -> &str {
        "Clock"
    }
}

/// Wall clock; the runner binaries use it for the log file date and the
/// speculative contract list
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_today_is_local_date() {
        let clock = SystemClock::new();
        let before = Local::now().date_naive();
        let today = clock.today();
        let after = Local::now().date_naive();
        // a midnight rollover between the reads lands on either side
        assert!(today == before || today == after);
    }

    #[test]
    fn test_today_follows_local_calendar_not_utc() {
        struct At(Timestamp);
        impl Clock for At {
            fn now(&self) -> Timestamp {
                self.0
            }
        }
        let instant = Utc::now();
        let clock = At(instant);
        assert_eq!(clock.today(), instant.with_timezone(&Local).date_naive());
        assert_eq!(clock.name(), "Clock");
    }
}
