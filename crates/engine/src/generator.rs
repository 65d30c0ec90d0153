use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, info, warn};

use rebook_core::clock::Clock;
use rebook_core::domain::ids::SuggestionId;
use rebook_core::domain::profile::PreferenceProfile;
use rebook_core::domain::slot::Slot;
use rebook_core::domain::suggestion::{Suggestion, SuggestionStatus};
use rebook_core::errors::RebookError;
use rebook_core::scoring::{confidence_score, reason_text};
use rebook_db::repositories::{BookingRepository, ProfileRepository, SuggestionRepository};

use crate::persistence;

/// Profiles need at least this many completed bookings before we suggest.
pub const MIN_COMPLETED_BOOKINGS: u32 = 2;

/// Suggest at most this many days before the projected due date.
pub const MAX_DAYS_BEFORE_DUE: i64 = 3;

/// How many days past the start date the slot search scans.
pub const SEARCH_WINDOW_DAYS: i64 = 14;

/// Generated suggestions expire this many days after creation.
pub const SUGGESTION_TTL_DAYS: i64 = 7;

/// The daily sweep: walks eligible profiles and creates at most one pending
/// suggestion per (user, location) pair that is coming due.
pub struct SuggestionGenerator {
    profiles: Arc<dyn ProfileRepository>,
    suggestions: Arc<dyn SuggestionRepository>,
    bookings: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
}

impl SuggestionGenerator {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        suggestions: Arc<dyn SuggestionRepository>,
        bookings: Arc<dyn BookingRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { profiles, suggestions, bookings, clock }
    }

    /// Run one sweep over every eligible profile. A failure on one profile is
    /// logged and skipped so the rest of the sweep still runs. Returns how
    /// many suggestions were created.
    pub async fn run_daily_sweep(&self) -> Result<u64, RebookError> {
        let candidates = self
            .profiles
            .list_sweep_candidates(MIN_COMPLETED_BOOKINGS)
            .await
            .map_err(persistence)?;

        let mut created = 0u64;
        for profile in &candidates {
            match self.generate_for_profile(profile).await {
                Ok(Some(id)) => {
                    created += 1;
                    info!(
                        event_name = "rebook.generator.suggestion_created",
                        suggestion_id = %id.0,
                        user_id = %profile.user_id.0,
                        location_id = %profile.location_id.0,
                        "suggestion created"
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        event_name = "rebook.generator.profile_failed",
                        user_id = %profile.user_id.0,
                        location_id = %profile.location_id.0,
                        error = %error,
                        "sweep skipped one profile"
                    );
                }
            }
        }

        info!(
            event_name = "rebook.generator.sweep_finished",
            candidates = candidates.len(),
            created,
            "daily sweep finished"
        );
        Ok(created)
    }

    async fn generate_for_profile(
        &self,
        profile: &PreferenceProfile,
    ) -> Result<Option<SuggestionId>, RebookError> {
        let now = self.clock.now();
        let today = self.clock.today();

        if self
            .suggestions
            .has_active(&profile.user_id, &profile.location_id, now)
            .await
            .map_err(persistence)?
        {
            return Ok(None);
        }

        let (Some(last_booking_date), Some(interval_days)) =
            (profile.last_booking_date, profile.average_interval_days)
        else {
            return Ok(None);
        };
        let Some(time) = profile.preferred_time_exact else {
            debug!(
                event_name = "rebook.generator.no_preferred_time",
                user_id = %profile.user_id.0,
                location_id = %profile.location_id.0,
                "profile has no preferred time yet"
            );
            return Ok(None);
        };
        if profile.preferred_service_ids.is_empty() {
            return Ok(None);
        }

        let due_date = last_booking_date + Duration::days(interval_days);
        let days_to_due = (due_date - today).num_days();
        if days_to_due > MAX_DAYS_BEFORE_DUE {
            return Ok(None);
        }

        // Overdue customers get a slot from today forward; on-time ones from
        // their due date.
        let search_start = today.max(due_date);
        let Some(date) = self.find_open_date(profile, search_start, time).await? else {
            debug!(
                event_name = "rebook.generator.window_exhausted",
                user_id = %profile.user_id.0,
                location_id = %profile.location_id.0,
                "no open slot in the search window"
            );
            return Ok(None);
        };

        let suggestion = Suggestion {
            id: SuggestionId::generate(),
            user_id: profile.user_id.clone(),
            location_id: profile.location_id.clone(),
            suggested_date: date,
            suggested_time: time,
            service_ids: profile.preferred_service_ids.clone(),
            staff_id: profile.preferred_staff_id.clone(),
            confidence_score: confidence_score(profile, date, time),
            reason: reason_text(days_to_due),
            expires_at: now + Duration::days(SUGGESTION_TTL_DAYS),
            status: SuggestionStatus::Pending,
            shown_at: None,
            responded_at: None,
            resulting_booking_id: None,
            dismissal_reason: None,
            created_at: now,
        };
        self.suggestions.insert(&suggestion).await.map_err(persistence)?;
        Ok(Some(suggestion.id))
    }

    /// First pass holds out for the preferred weekday; second pass takes any
    /// open date in the window.
    async fn find_open_date(
        &self,
        profile: &PreferenceProfile,
        start: NaiveDate,
        time: chrono::NaiveTime,
    ) -> Result<Option<NaiveDate>, RebookError> {
        let window =
            || (0..SEARCH_WINDOW_DAYS).map(move |offset| start + Duration::days(offset));

        if let Some(weekday) = profile.preferred_day_of_week {
            for date in window().filter(|date| date.weekday() == weekday) {
                if self.slot_open(profile, date, time).await? {
                    return Ok(Some(date));
                }
            }
        }

        for date in window() {
            if self.slot_open(profile, date, time).await? {
                return Ok(Some(date));
            }
        }

        Ok(None)
    }

    async fn slot_open(
        &self,
        profile: &PreferenceProfile,
        date: NaiveDate,
        time: chrono::NaiveTime,
    ) -> Result<bool, RebookError> {
        let slot = Slot {
            location_id: profile.location_id.clone(),
            date,
            time,
            staff_id: profile.preferred_staff_id.clone(),
        };
        Ok(!self.bookings.slot_taken(&slot).await.map_err(persistence)?)
    }
}
