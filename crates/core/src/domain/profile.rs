use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{BookingId, LocationId, ServiceId, StaffId, UserId};

/// Coarse daypart preference derived from booking start times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Morning,
    Afternoon,
    Evening,
}

impl TimeBucket {
    /// Before noon is morning, noon through 16:59 is afternoon, 17:00
    /// onwards is evening.
    pub fn from_time(time: NaiveTime) -> Self {
        use chrono::Timelike;
        match time.hour() {
            0..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            _ => None,
        }
    }
}

/// Learned booking preferences for one customer at one location.
///
/// Exactly one row exists per (user, location) pair once that customer has
/// completed a booking there; the row is updated on every later completion
/// and never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub user_id: UserId,
    pub location_id: LocationId,
    pub preferred_staff_id: Option<StaffId>,
    /// Top services by completed-booking frequency, best first, at most 3.
    pub preferred_service_ids: Vec<ServiceId>,
    pub preferred_day_of_week: Option<Weekday>,
    pub preferred_time_bucket: Option<TimeBucket>,
    pub preferred_time_exact: Option<NaiveTime>,
    /// Median gap in days between consecutive completed bookings.
    pub average_interval_days: Option<i64>,
    pub last_booking_id: Option<BookingId>,
    pub last_booking_date: Option<NaiveDate>,
    pub total_completed_bookings: u32,
    pub total_spent: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::TimeBucket;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn buckets_split_at_noon_and_five() {
        assert_eq!(TimeBucket::from_time(at(0, 0)), TimeBucket::Morning);
        assert_eq!(TimeBucket::from_time(at(11, 59)), TimeBucket::Morning);
        assert_eq!(TimeBucket::from_time(at(12, 0)), TimeBucket::Afternoon);
        assert_eq!(TimeBucket::from_time(at(16, 59)), TimeBucket::Afternoon);
        assert_eq!(TimeBucket::from_time(at(17, 0)), TimeBucket::Evening);
        assert_eq!(TimeBucket::from_time(at(23, 30)), TimeBucket::Evening);
    }

    #[test]
    fn bucket_round_trips_through_strings() {
        for bucket in [TimeBucket::Morning, TimeBucket::Afternoon, TimeBucket::Evening] {
            assert_eq!(TimeBucket::parse(bucket.as_str()), Some(bucket));
        }
        assert_eq!(TimeBucket::parse("midnight"), None);
    }
}
