//! Pure preference-learning math over completed-booking history.
//!
//! Everything here is deterministic: same history in, same learned profile
//! out. Persistence and ordering concerns live in the engine crate.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::domain::booking::Booking;
use crate::domain::ids::{ServiceId, StaffId};
use crate::domain::profile::TimeBucket;

/// Fallback interval when no historical gap survives the outlier filter.
pub const DEFAULT_INTERVAL_DAYS: i64 = 30;

/// Gaps at or above this many days are treated as noise (lapsed customer,
/// imported history) and excluded from the interval median.
pub const OUTLIER_GAP_DAYS: i64 = 180;

/// How many services to keep in the ranked preference list.
pub const RANKED_SERVICE_LIMIT: usize = 3;

/// Mode fields recomputed from history on every completed booking.
#[derive(Clone, Debug, PartialEq)]
pub struct LearnedPreferences {
    pub preferred_staff_id: Option<StaffId>,
    pub preferred_service_ids: Vec<ServiceId>,
    pub preferred_day_of_week: Option<Weekday>,
    pub preferred_time_bucket: Option<TimeBucket>,
    pub preferred_time_exact: Option<NaiveTime>,
    pub average_interval_days: i64,
}

/// Derive the full preference set from the completed history for one
/// (user, location) pair. `history` must be sorted by date descending and
/// include the triggering booking; `trigger` supplies the staff fallback
/// when no staff mode exists.
pub fn learn_preferences(history: &[Booking], trigger: &Booking) -> LearnedPreferences {
    let preferred_staff_id = mode(history.iter().filter_map(|booking| booking.staff_id.clone()))
        .or_else(|| trigger.staff_id.clone());

    let preferred_service_ids = ranked_services(history);

    let preferred_day_of_week = mode(history.iter().map(|booking| booking.date.weekday()));

    let preferred_time_exact = mode(history.iter().map(|booking| booking.time));
    let preferred_time_bucket = preferred_time_exact.map(TimeBucket::from_time);

    let gaps = valid_gap_days(&history.iter().map(|booking| booking.date).collect::<Vec<_>>());
    let average_interval_days = median_days(&gaps).unwrap_or(DEFAULT_INTERVAL_DAYS);

    LearnedPreferences {
        preferred_staff_id,
        preferred_service_ids,
        preferred_day_of_week,
        preferred_time_bucket,
        preferred_time_exact,
        average_interval_days,
    }
}

/// Top services by frequency, best first, capped at [`RANKED_SERVICE_LIMIT`].
/// Ties break toward the service seen first in the history ordering.
pub fn ranked_services(history: &[Booking]) -> Vec<ServiceId> {
    let mut counts: HashMap<ServiceId, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for booking in history {
        for service_id in &booking.service_ids {
            let entry = counts.entry(service_id.clone()).or_insert((0, order));
            entry.0 += 1;
            order += 1;
        }
    }

    let mut ranked: Vec<(ServiceId, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.truncate(RANKED_SERVICE_LIMIT);
    ranked.into_iter().map(|(service_id, _)| service_id).collect()
}

/// Day gaps between consecutive dates (sorted descending), keeping only
/// gaps strictly between 0 and [`OUTLIER_GAP_DAYS`].
pub fn valid_gap_days(dates_desc: &[NaiveDate]) -> Vec<i64> {
    dates_desc
        .windows(2)
        .map(|pair| (pair[0] - pair[1]).num_days())
        .filter(|gap| *gap > 0 && *gap < OUTLIER_GAP_DAYS)
        .collect()
}

/// Median of the gap list; even-length lists average the middle pair.
pub fn median_days(gaps: &[i64]) -> Option<i64> {
    if gaps.is_empty() {
        return None;
    }

    let mut sorted = gaps.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2)
    }
}

/// Most frequent element, ties broken toward the earliest occurrence.
fn mode<T: Clone + Eq + Hash>(items: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();

    for (index, item) in items.enumerate() {
        let entry = counts.entry(item).or_insert((0, index));
        entry.0 += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
    use rust_decimal::Decimal;

    use crate::domain::booking::{Booking, BookingSource, BookingStatus};
    use crate::domain::ids::{BookingId, LocationId, ServiceId, StaffId, UserId};
    use crate::domain::profile::TimeBucket;

    use super::{learn_preferences, median_days, mode, ranked_services, valid_gap_days};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn completed(
        id: &str,
        day: NaiveDate,
        hour: u32,
        staff: Option<&str>,
        services: &[&str],
    ) -> Booking {
        Booking {
            id: BookingId(id.to_string()),
            user_id: Some(UserId("user-1".to_string())),
            location_id: Some(LocationId("loc-1".to_string())),
            service_ids: services.iter().map(|s| ServiceId(s.to_string())).collect(),
            staff_id: staff.map(|s| StaffId(s.to_string())),
            date: day,
            time: NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time"),
            status: BookingStatus::Completed,
            total_price: Decimal::new(4500, 2),
            source: BookingSource::Direct,
            created_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[test]
    fn median_of_odd_list_is_middle_element() {
        assert_eq!(median_days(&[10, 20, 30]), Some(20));
    }

    #[test]
    fn median_of_even_list_averages_middle_pair() {
        assert_eq!(median_days(&[10, 20]), Some(15));
    }

    #[test]
    fn median_of_empty_list_is_none() {
        assert_eq!(median_days(&[]), None);
    }

    #[test]
    fn gap_filter_discards_outliers_then_median_applies() {
        // Gaps 5, 200, 15: the 200-day gap is noise.
        let dates = vec![date(2024, 8, 12), date(2024, 8, 7), date(2024, 1, 20), date(2024, 1, 5)];
        let gaps = valid_gap_days(&dates);
        assert_eq!(gaps, vec![5, 15]);
        assert_eq!(median_days(&gaps), Some(10));
    }

    #[test]
    fn zero_day_gaps_are_discarded() {
        let dates = vec![date(2024, 3, 10), date(2024, 3, 10), date(2024, 3, 3)];
        assert_eq!(valid_gap_days(&dates), vec![7]);
    }

    #[test]
    fn mode_picks_most_frequent_with_first_seen_tiebreak() {
        assert_eq!(mode(["a", "b", "b", "c"].into_iter()), Some("b"));
        assert_eq!(mode(["x", "y"].into_iter()), Some("x"));
        assert_eq!(mode(std::iter::empty::<&str>()), None);
    }

    #[test]
    fn service_ranking_keeps_top_three_by_frequency() {
        let history = vec![
            completed("b1", date(2024, 4, 1), 10, None, &["cut", "color"]),
            completed("b2", date(2024, 3, 1), 10, None, &["cut", "blowout"]),
            completed("b3", date(2024, 2, 1), 10, None, &["cut", "color", "treatment"]),
        ];

        let ranked = ranked_services(&history);
        assert_eq!(
            ranked,
            vec![
                ServiceId("cut".to_string()),
                ServiceId("color".to_string()),
                ServiceId("blowout".to_string()),
            ]
        );
    }

    #[test]
    fn learns_modes_from_full_history() {
        // Three Mondays at 10:00 with staff-a twice.
        let history = vec![
            completed("b3", date(2024, 3, 18), 10, Some("staff-a"), &["cut"]),
            completed("b2", date(2024, 3, 4), 10, Some("staff-b"), &["cut"]),
            completed("b1", date(2024, 2, 19), 10, Some("staff-a"), &["cut", "color"]),
        ];

        let learned = learn_preferences(&history, &history[0]);

        assert_eq!(learned.preferred_staff_id, Some(StaffId("staff-a".to_string())));
        assert_eq!(learned.preferred_day_of_week, Some(Weekday::Mon));
        assert_eq!(learned.preferred_time_bucket, Some(TimeBucket::Morning));
        assert_eq!(
            learned.preferred_time_exact,
            Some(NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"))
        );
        assert_eq!(learned.average_interval_days, 14);
    }

    #[test]
    fn staff_falls_back_to_triggering_booking() {
        let trigger = completed("b1", date(2024, 3, 4), 14, Some("staff-z"), &["cut"]);
        let history = vec![completed("b0", date(2024, 3, 4), 14, None, &["cut"])];

        let learned = learn_preferences(&history, &trigger);
        assert_eq!(learned.preferred_staff_id, Some(StaffId("staff-z".to_string())));
    }

    #[test]
    fn single_booking_defaults_interval_to_thirty_days() {
        let history = vec![completed("b1", date(2024, 3, 4), 9, None, &["cut"])];
        let learned = learn_preferences(&history, &history[0]);
        assert_eq!(learned.average_interval_days, super::DEFAULT_INTERVAL_DAYS);
    }
}
