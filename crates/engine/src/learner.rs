use std::sync::Arc;

use tracing::{info, warn};

use rebook_core::clock::Clock;
use rebook_core::domain::booking::BookingStatus;
use rebook_core::domain::ids::BookingId;
use rebook_core::domain::profile::PreferenceProfile;
use rebook_core::errors::RebookError;
use rebook_core::learning::learn_preferences;
use rebook_db::repositories::{BookingRepository, ProfileRepository};

use crate::persistence;

/// Rebuilds a customer's preference profile whenever one of their bookings
/// completes. Learning is a pure function of the completed history; only the
/// running totals carry over from the previous profile.
pub struct PreferenceLearner {
    bookings: Arc<dyn BookingRepository>,
    profiles: Arc<dyn ProfileRepository>,
    clock: Arc<dyn Clock>,
}

impl PreferenceLearner {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        profiles: Arc<dyn ProfileRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { bookings, profiles, clock }
    }

    /// Handle a booking-completed event. Events that cannot be learned from
    /// (unknown booking, walk-in without a customer, wrong status) are
    /// logged and skipped rather than failed, since the completion itself
    /// already happened.
    pub async fn on_booking_completed(&self, booking_id: &BookingId) -> Result<(), RebookError> {
        let Some(booking) = self.bookings.find_by_id(booking_id).await.map_err(persistence)?
        else {
            warn!(
                event_name = "rebook.learner.unknown_booking",
                booking_id = %booking_id.0,
                "completion event for a booking we cannot find, skipping"
            );
            return Ok(());
        };

        let (Some(user_id), Some(location_id)) =
            (booking.user_id.clone(), booking.location_id.clone())
        else {
            info!(
                event_name = "rebook.learner.anonymous_booking",
                booking_id = %booking_id.0,
                "booking has no customer or location attached, nothing to learn"
            );
            return Ok(());
        };

        if booking.status != BookingStatus::Completed {
            warn!(
                event_name = "rebook.learner.not_completed",
                booking_id = %booking_id.0,
                status = booking.status.as_str(),
                "completion event for a booking that is not completed, skipping"
            );
            return Ok(());
        }

        let history = self
            .bookings
            .completed_history(&user_id, &location_id)
            .await
            .map_err(persistence)?;
        let learned = learn_preferences(&history, &booking);

        let existing =
            self.profiles.find(&user_id, &location_id).await.map_err(persistence)?;
        let (total_completed_bookings, total_spent) = match &existing {
            Some(profile) => (
                profile.total_completed_bookings + 1,
                profile.total_spent + booking.total_price,
            ),
            None => (1, booking.total_price),
        };

        let profile = PreferenceProfile {
            user_id: user_id.clone(),
            location_id: location_id.clone(),
            preferred_staff_id: learned.preferred_staff_id,
            preferred_service_ids: learned.preferred_service_ids,
            preferred_day_of_week: learned.preferred_day_of_week,
            preferred_time_bucket: learned.preferred_time_bucket,
            preferred_time_exact: learned.preferred_time_exact,
            average_interval_days: Some(learned.average_interval_days),
            last_booking_id: Some(booking.id.clone()),
            last_booking_date: Some(booking.date),
            total_completed_bookings,
            total_spent,
            updated_at: self.clock.now(),
        };
        self.profiles.upsert(&profile).await.map_err(persistence)?;

        info!(
            event_name = "rebook.learner.profile_updated",
            user_id = %user_id.0,
            location_id = %location_id.0,
            completed_bookings = total_completed_bookings,
            interval_days = profile.average_interval_days,
            "preference profile relearned"
        );
        Ok(())
    }
}
