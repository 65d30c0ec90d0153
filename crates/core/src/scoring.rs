//! Confidence scoring and reason copy for generated suggestions.
//!
//! Both are deterministic functions of the profile and the chosen slot so
//! the generator stays unit-testable without a store.

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::domain::profile::PreferenceProfile;

pub const BASE_SCORE: u8 = 50;
pub const MAX_SCORE: u8 = 100;

/// Heuristic 0-100 relevance estimate for proposing (date, time) to the
/// customer behind `profile`.
pub fn confidence_score(profile: &PreferenceProfile, date: NaiveDate, time: NaiveTime) -> u8 {
    let mut score = u32::from(BASE_SCORE);

    if profile.preferred_staff_id.is_some() {
        score += 10;
    }

    if profile.preferred_time_exact == Some(time) {
        score += 10;
    }

    if profile.preferred_day_of_week == Some(date.weekday()) {
        score += 5;
    }

    if profile.total_completed_bookings >= 5 {
        score += 15;
    } else if profile.total_completed_bookings >= 3 {
        score += 8;
    }

    score.min(u32::from(MAX_SCORE)) as u8
}

/// Customer-facing framing for why this suggestion exists, keyed on how far
/// past or before the due date the sweep ran.
pub fn reason_text(days_to_due: i64) -> String {
    if days_to_due < -7 {
        "It's been a while since your last visit. We'd love to see you again!".to_string()
    } else if days_to_due < 0 {
        format!("You're {} days overdue for your usual appointment.", -days_to_due)
    } else if days_to_due == 0 {
        "Today is the perfect day for your next appointment.".to_string()
    } else {
        format!("Your next appointment is due in {days_to_due} days.")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
    use rust_decimal::Decimal;

    use crate::domain::ids::{LocationId, ServiceId, StaffId, UserId};
    use crate::domain::profile::{PreferenceProfile, TimeBucket};

    use super::{confidence_score, reason_text};

    fn profile(completions: u32, staff: Option<&str>) -> PreferenceProfile {
        PreferenceProfile {
            user_id: UserId("user-1".to_string()),
            location_id: LocationId("loc-1".to_string()),
            preferred_staff_id: staff.map(|s| StaffId(s.to_string())),
            preferred_service_ids: vec![ServiceId("cut".to_string())],
            preferred_day_of_week: Some(Weekday::Mon),
            preferred_time_bucket: Some(TimeBucket::Morning),
            preferred_time_exact: Some(NaiveTime::from_hms_opt(10, 0, 0).expect("valid time")),
            average_interval_days: Some(30),
            last_booking_id: None,
            last_booking_date: Some(NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")),
            total_completed_bookings: completions,
            total_spent: Decimal::ZERO,
            updated_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 5).expect("valid date")
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 6).expect("valid date")
    }

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time")
    }

    #[test]
    fn full_match_with_deep_history_scores_ninety() {
        // 50 base + 10 staff + 10 time + 5 weekday + 15 history.
        assert_eq!(confidence_score(&profile(5, Some("staff-a")), monday(), at(10)), 90);
    }

    #[test]
    fn shallow_history_scores_lower() {
        // 50 + 10 + 10 + 5 + 8.
        assert_eq!(confidence_score(&profile(3, Some("staff-a")), monday(), at(10)), 83);
        // 50 + 10 + 10 + 5, two completions earn no history bonus.
        assert_eq!(confidence_score(&profile(2, Some("staff-a")), monday(), at(10)), 75);
    }

    #[test]
    fn mismatched_slot_earns_only_base_and_history() {
        // 50 base + 15 history; no staff, wrong day, wrong time.
        assert_eq!(confidence_score(&profile(5, None), tuesday(), at(14)), 65);
    }

    #[test]
    fn score_never_exceeds_cap() {
        let score = confidence_score(&profile(50, Some("staff-a")), monday(), at(10));
        assert!(score <= super::MAX_SCORE);
    }

    #[test]
    fn reason_copy_tracks_days_to_due() {
        assert!(reason_text(-10).contains("been a while"));
        assert_eq!(reason_text(-3), "You're 3 days overdue for your usual appointment.");
        assert_eq!(reason_text(0), "Today is the perfect day for your next appointment.");
        assert_eq!(reason_text(2), "Your next appointment is due in 2 days.");
    }
}
