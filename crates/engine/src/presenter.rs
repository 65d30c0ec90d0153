use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use rebook_core::clock::Clock;
use rebook_core::domain::booking::Booking;
use rebook_core::domain::ids::{LocationId, ServiceId, StaffId, SuggestionId, UserId};
use rebook_core::domain::suggestion::{Suggestion, SuggestionStatus};
use rebook_core::errors::RebookError;
use rebook_db::repositories::{
    BookingRepository, DirectoryRepository, ProfileRepository, SuggestionRepository,
};

use crate::persistence;
use crate::types::{LastVisit, PresentedSuggestion, ServiceDetail, SuggestionFeed};

/// How many suggestions one feed request returns at most.
pub const FEED_LIMIT: u32 = 10;

/// How many per-location last-visit summaries ride along with the feed.
pub const LAST_VISIT_LIMIT: u32 = 5;

/// Read side of the suggestion flow: assembles the feed a customer sees and
/// flips freshly delivered suggestions from pending to shown.
pub struct SuggestionPresenter {
    suggestions: Arc<dyn SuggestionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    bookings: Arc<dyn BookingRepository>,
    directory: Arc<dyn DirectoryRepository>,
    clock: Arc<dyn Clock>,
}

impl SuggestionPresenter {
    pub fn new(
        suggestions: Arc<dyn SuggestionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        bookings: Arc<dyn BookingRepository>,
        directory: Arc<dyn DirectoryRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { suggestions, profiles, bookings, directory, clock }
    }

    pub async fn get_suggestions(&self, user_id: &UserId) -> Result<SuggestionFeed, RebookError> {
        let now = self.clock.now();
        let today = self.clock.today();

        let active = self
            .suggestions
            .active_for_user(user_id, now, FEED_LIMIT)
            .await
            .map_err(persistence)?;
        let profiles = self
            .profiles
            .list_for_user(user_id, LAST_VISIT_LIMIT)
            .await
            .map_err(persistence)?;

        let (locations, services, staff) = self.load_directory(&active, &profiles).await?;
        let occupying = self.load_occupying(&active).await?;

        let mut presented = Vec::with_capacity(active.len());
        let mut newly_shown: Vec<SuggestionId> = Vec::new();

        for suggestion in &active {
            let Some(location) = locations.get(&suggestion.location_id.0) else {
                warn!(
                    event_name = "rebook.presenter.location_missing",
                    suggestion_id = %suggestion.id.0,
                    location_id = %suggestion.location_id.0,
                    "suggestion points at a location that no longer exists"
                );
                continue;
            };

            let details: Vec<ServiceDetail> = suggestion
                .service_ids
                .iter()
                .filter_map(|id| services.get(&id.0))
                .map(|service| ServiceDetail {
                    id: service.0.clone(),
                    name: service.1.clone(),
                    price: service.2,
                })
                .collect();
            if details.len() < suggestion.service_ids.len() {
                debug!(
                    event_name = "rebook.presenter.service_missing",
                    suggestion_id = %suggestion.id.0,
                    "some suggested services are gone, presenting the rest"
                );
            }
            let estimated_total: Decimal = details.iter().map(|d| d.price).sum();

            let staff_name = suggestion
                .staff_id
                .as_ref()
                .and_then(|id| staff.get(&id.0))
                .cloned();

            if suggestion.status == SuggestionStatus::Pending {
                newly_shown.push(suggestion.id.clone());
            }

            presented.push(PresentedSuggestion {
                id: suggestion.id.clone(),
                location_id: suggestion.location_id.clone(),
                location_name: location.clone(),
                date: suggestion.suggested_date,
                time: suggestion.suggested_time,
                services: details,
                staff_id: suggestion.staff_id.clone(),
                staff_name,
                confidence_score: suggestion.confidence_score,
                reason: suggestion.reason.clone(),
                expires_at: suggestion.expires_at,
                status: if suggestion.status == SuggestionStatus::Pending {
                    SuggestionStatus::Shown
                } else {
                    suggestion.status
                },
                estimated_total,
                available: slot_still_open(suggestion, &occupying),
            });
        }

        if !newly_shown.is_empty() {
            self.suggestions.mark_shown(&newly_shown, now).await.map_err(persistence)?;
        }

        let mut last_visits = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let Some(last_visit_date) = profile.last_booking_date else { continue };
            let Some(location_name) = locations.get(&profile.location_id.0) else { continue };

            let preferred_services: Vec<String> = profile
                .preferred_service_ids
                .iter()
                .filter_map(|id| services.get(&id.0))
                .map(|service| service.1.clone())
                .collect();
            let preferred_staff_name = profile
                .preferred_staff_id
                .as_ref()
                .and_then(|id| staff.get(&id.0))
                .cloned();

            last_visits.push(LastVisit {
                location_id: profile.location_id.clone(),
                location_name: location_name.clone(),
                last_visit_date,
                days_since: (today - last_visit_date).num_days(),
                preferred_services,
                preferred_staff_name,
            });
        }

        Ok(SuggestionFeed { suggestions: presented, last_visits })
    }

    /// One batched round-trip per directory table for everything the feed
    /// references.
    #[allow(clippy::type_complexity)]
    async fn load_directory(
        &self,
        active: &[Suggestion],
        profiles: &[rebook_core::domain::profile::PreferenceProfile],
    ) -> Result<
        (
            HashMap<String, String>,
            HashMap<String, (ServiceId, String, Decimal)>,
            HashMap<String, String>,
        ),
        RebookError,
    > {
        let mut location_ids: HashSet<LocationId> = HashSet::new();
        let mut service_ids: HashSet<ServiceId> = HashSet::new();
        let mut staff_ids: HashSet<StaffId> = HashSet::new();

        for suggestion in active {
            location_ids.insert(suggestion.location_id.clone());
            service_ids.extend(suggestion.service_ids.iter().cloned());
            staff_ids.extend(suggestion.staff_id.iter().cloned());
        }
        for profile in profiles {
            location_ids.insert(profile.location_id.clone());
            service_ids.extend(profile.preferred_service_ids.iter().cloned());
            staff_ids.extend(profile.preferred_staff_id.iter().cloned());
        }

        let location_ids: Vec<LocationId> = location_ids.into_iter().collect();
        let service_ids: Vec<ServiceId> = service_ids.into_iter().collect();
        let staff_ids: Vec<StaffId> = staff_ids.into_iter().collect();

        let locations = self
            .directory
            .find_locations(&location_ids)
            .await
            .map_err(persistence)?
            .into_iter()
            .map(|location| (location.id.0.clone(), location.name))
            .collect();
        let services = self
            .directory
            .find_services(&service_ids)
            .await
            .map_err(persistence)?
            .into_iter()
            .map(|service| (service.id.0.clone(), (service.id, service.name, service.price)))
            .collect();
        let staff = self
            .directory
            .find_staff(&staff_ids)
            .await
            .map_err(persistence)?
            .into_iter()
            .map(|member| (member.id.0.clone(), member.name))
            .collect();

        Ok((locations, services, staff))
    }

    async fn load_occupying(
        &self,
        active: &[Suggestion],
    ) -> Result<Vec<Booking>, RebookError> {
        let mut pairs: Vec<(LocationId, chrono::NaiveDate)> = active
            .iter()
            .map(|suggestion| (suggestion.location_id.clone(), suggestion.suggested_date))
            .collect();
        pairs.sort_by(|a, b| (&a.0 .0, a.1).cmp(&(&b.0 .0, b.1)));
        pairs.dedup();

        self.bookings.occupying_on_dates(&pairs).await.map_err(persistence)
    }
}

/// Advisory availability: mirrors the commit-time conflict rule. A named
/// staff member is blocked by their own bookings and by unassigned ones; a
/// staff-less suggestion is blocked by any booking at that time.
fn slot_still_open(suggestion: &Suggestion, occupying: &[Booking]) -> bool {
    !occupying.iter().any(|booking| {
        booking.location_id.as_ref() == Some(&suggestion.location_id)
            && booking.date == suggestion.suggested_date
            && booking.time == suggestion.suggested_time
            && match (&suggestion.staff_id, &booking.staff_id) {
                (Some(wanted), Some(assigned)) => wanted == assigned,
                _ => true,
            }
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;

    use rebook_core::domain::booking::{Booking, BookingSource, BookingStatus};
    use rebook_core::domain::ids::{BookingId, LocationId, ServiceId, StaffId, SuggestionId, UserId};
    use rebook_core::domain::suggestion::{Suggestion, SuggestionStatus};

    use super::slot_still_open;

    fn suggestion(staff: Option<&str>) -> Suggestion {
        Suggestion {
            id: SuggestionId("sug-1".to_string()),
            user_id: UserId("user-1".to_string()),
            location_id: LocationId("loc-1".to_string()),
            suggested_date: NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"),
            suggested_time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
            service_ids: vec![ServiceId("svc-cut".to_string())],
            staff_id: staff.map(|s| StaffId(s.to_string())),
            confidence_score: 75,
            reason: "Your next appointment is due in 2 days.".to_string(),
            expires_at: DateTime::<Utc>::MAX_UTC,
            status: SuggestionStatus::Pending,
            shown_at: None,
            responded_at: None,
            resulting_booking_id: None,
            dismissal_reason: None,
            created_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn booking(staff: Option<&str>, hour: u32) -> Booking {
        Booking {
            id: BookingId("bk-1".to_string()),
            user_id: Some(UserId("user-2".to_string())),
            location_id: Some(LocationId("loc-1".to_string())),
            service_ids: vec![ServiceId("svc-cut".to_string())],
            staff_id: staff.map(|s| StaffId(s.to_string())),
            date: NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"),
            time: NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time"),
            status: BookingStatus::Confirmed,
            total_price: Decimal::new(4500, 2),
            source: BookingSource::Direct,
            created_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[test]
    fn other_staff_at_same_time_leaves_slot_open() {
        let occupying = vec![booking(Some("staff-b"), 10)];
        assert!(slot_still_open(&suggestion(Some("staff-a")), &occupying));
    }

    #[test]
    fn same_staff_or_unassigned_booking_blocks_named_staff() {
        assert!(!slot_still_open(
            &suggestion(Some("staff-a")),
            &[booking(Some("staff-a"), 10)]
        ));
        assert!(!slot_still_open(&suggestion(Some("staff-a")), &[booking(None, 10)]));
    }

    #[test]
    fn any_booking_blocks_a_staffless_suggestion() {
        assert!(!slot_still_open(&suggestion(None), &[booking(Some("staff-b"), 10)]));
    }

    #[test]
    fn different_time_never_blocks() {
        assert!(slot_still_open(&suggestion(None), &[booking(None, 11)]));
    }
}
