use chrono::{DateTime, NaiveDate, Utc};

/// Injectable time source. All "now"-based math in the engine goes through
/// this seam so sweeps and expiry rules can be tested at a fixed instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Clock, FixedClock};

    #[test]
    fn fixed_clock_reports_its_pinned_day() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 29, 9, 0, 0).single().expect("valid instant");
        let clock = FixedClock(instant);

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 29).expect("valid date"));
    }
}
