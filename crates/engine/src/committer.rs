use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use tracing::info;

use rebook_core::clock::Clock;
use rebook_core::domain::booking::{Booking, BookingSource, BookingStatus};
use rebook_core::domain::ids::{BookingId, ServiceId, StaffId, SuggestionId, UserId};
use rebook_core::domain::slot::Slot;
use rebook_core::domain::suggestion::{Suggestion, SuggestionStatus};
use rebook_core::errors::RebookError;
use rebook_db::repositories::{
    BookingRepository, CommitOutcome, DirectoryRepository, SuggestionRepository,
};

use crate::persistence;
use crate::slot_lock::SlotLockRegistry;
use crate::types::{ConfirmedRebooking, CustomizeRequest, ServiceDetail};

/// Turns an accepted or customized suggestion into a confirmed booking, and
/// records dismissals. All slot writes go through [`SlotLockRegistry`] plus
/// the repository's claim-and-recheck transaction.
pub struct BookingCommitter {
    suggestions: Arc<dyn SuggestionRepository>,
    bookings: Arc<dyn BookingRepository>,
    directory: Arc<dyn DirectoryRepository>,
    locks: SlotLockRegistry,
    clock: Arc<dyn Clock>,
}

impl BookingCommitter {
    pub fn new(
        suggestions: Arc<dyn SuggestionRepository>,
        bookings: Arc<dyn BookingRepository>,
        directory: Arc<dyn DirectoryRepository>,
        locks: SlotLockRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { suggestions, bookings, directory, locks, clock }
    }

    /// One-tap accept: book exactly what was suggested.
    pub async fn accept_suggestion(
        &self,
        user_id: &UserId,
        suggestion_id: &SuggestionId,
    ) -> Result<ConfirmedRebooking, RebookError> {
        self.commit(user_id, suggestion_id, None).await
    }

    /// Accept with overrides: a different slot, staff, or service set.
    pub async fn customize_suggestion(
        &self,
        user_id: &UserId,
        suggestion_id: &SuggestionId,
        request: CustomizeRequest,
    ) -> Result<ConfirmedRebooking, RebookError> {
        self.commit(user_id, suggestion_id, Some(request)).await
    }

    /// Record that the customer declined. Terminal suggestions cannot be
    /// dismissed again.
    pub async fn dismiss_suggestion(
        &self,
        user_id: &UserId,
        suggestion_id: &SuggestionId,
        reason: Option<String>,
    ) -> Result<(), RebookError> {
        let now = self.clock.now();
        let suggestion = self.load_owned(user_id, suggestion_id).await?;
        check_answerable(&suggestion)?;

        let dismissed = self
            .suggestions
            .dismiss(suggestion_id, now, reason.as_deref())
            .await
            .map_err(persistence)?;
        if !dismissed {
            // Someone accepted or the reaper expired it since we looked.
            return Err(RebookError::AlreadyUsed);
        }

        info!(
            event_name = "rebook.committer.suggestion_dismissed",
            suggestion_id = %suggestion_id.0,
            user_id = %user_id.0,
            has_reason = reason.is_some(),
            "suggestion dismissed"
        );
        Ok(())
    }

    async fn commit(
        &self,
        user_id: &UserId,
        suggestion_id: &SuggestionId,
        customize: Option<CustomizeRequest>,
    ) -> Result<ConfirmedRebooking, RebookError> {
        let now = self.clock.now();
        let suggestion = self.load_owned(user_id, suggestion_id).await?;
        check_answerable(&suggestion)?;
        if now > suggestion.expires_at {
            return Err(RebookError::Expired);
        }

        let (date, time, staff_id, service_ids, source) = resolve_request(&suggestion, customize)?;

        let customer = self
            .directory
            .find_customer(user_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| RebookError::DependencyNotFound("customer".to_string()))?;
        let location = self
            .directory
            .find_location(&suggestion.location_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| RebookError::DependencyNotFound("location".to_string()))?;

        let services = self
            .directory
            .find_services(&service_ids)
            .await
            .map_err(persistence)?;
        let mut details = Vec::with_capacity(service_ids.len());
        for service_id in &service_ids {
            let Some(service) = services.iter().find(|s| s.id == *service_id) else {
                return Err(RebookError::Validation(format!(
                    "unknown service `{}`",
                    service_id.0
                )));
            };
            details.push(ServiceDetail {
                id: service.id.clone(),
                name: service.name.clone(),
                price: service.price,
            });
        }
        let total: Decimal = details.iter().map(|d| d.price).sum();

        let staff_name = match &staff_id {
            Some(id) => self
                .directory
                .find_staff(std::slice::from_ref(id))
                .await
                .map_err(persistence)?
                .into_iter()
                .next()
                .map(|member| member.name),
            None => None,
        };

        let slot = Slot {
            location_id: suggestion.location_id.clone(),
            date,
            time,
            staff_id: staff_id.clone(),
        };
        let booking = Booking {
            id: BookingId::generate(),
            user_id: Some(user_id.clone()),
            location_id: Some(suggestion.location_id.clone()),
            service_ids,
            staff_id,
            date,
            time,
            status: BookingStatus::Confirmed,
            total_price: total,
            source,
            created_at: now,
        };

        // The lock serializes commits for this slot in-process; the
        // transaction then re-checks the suggestion and the slot.
        let _guard = self.locks.acquire(slot.lock_key()).await;
        let outcome = self
            .bookings
            .commit_rebooking(&booking, suggestion_id, now)
            .await
            .map_err(persistence)?;
        match outcome {
            CommitOutcome::Committed => {}
            CommitOutcome::SuggestionAlreadyClaimed => return Err(RebookError::AlreadyUsed),
            CommitOutcome::SlotConflict => return Err(RebookError::SlotUnavailable),
        }

        info!(
            event_name = "rebook.committer.rebooking_confirmed",
            booking_id = %booking.id.0,
            suggestion_id = %suggestion_id.0,
            customer = %customer.name,
            source = booking.source.as_str(),
            total = %total,
            "rebooking confirmed"
        );

        Ok(ConfirmedRebooking {
            booking_id: booking.id,
            location_name: location.name,
            date,
            time,
            services: details,
            staff_name,
            total,
        })
    }

    /// Fetch plus ownership check. A suggestion belonging to someone else is
    /// reported as not found rather than leaking its existence.
    async fn load_owned(
        &self,
        user_id: &UserId,
        suggestion_id: &SuggestionId,
    ) -> Result<Suggestion, RebookError> {
        let suggestion = self
            .suggestions
            .find_by_id(suggestion_id)
            .await
            .map_err(persistence)?
            .ok_or(RebookError::NotFound)?;
        if suggestion.user_id != *user_id {
            return Err(RebookError::NotFound);
        }
        Ok(suggestion)
    }
}

fn check_answerable(suggestion: &Suggestion) -> Result<(), RebookError> {
    match suggestion.status {
        SuggestionStatus::Accepted | SuggestionStatus::Dismissed => Err(RebookError::AlreadyUsed),
        SuggestionStatus::Expired => Err(RebookError::Expired),
        SuggestionStatus::Pending | SuggestionStatus::Shown => Ok(()),
    }
}

/// Merge customization over the suggested defaults. `staff_id: None` keeps
/// the suggested staff member; clearing to unassigned is not supported.
#[allow(clippy::type_complexity)]
fn resolve_request(
    suggestion: &Suggestion,
    customize: Option<CustomizeRequest>,
) -> Result<(NaiveDate, NaiveTime, Option<StaffId>, Vec<ServiceId>, BookingSource), RebookError> {
    let Some(request) = customize else {
        return Ok((
            suggestion.suggested_date,
            suggestion.suggested_time,
            suggestion.staff_id.clone(),
            suggestion.service_ids.clone(),
            BookingSource::QuickRebook,
        ));
    };

    let date = request.date.unwrap_or(suggestion.suggested_date);
    let time = request.time.unwrap_or(suggestion.suggested_time);
    let staff_id = request.staff_id.or_else(|| suggestion.staff_id.clone());

    let mut service_ids = suggestion.service_ids.clone();
    for added in request.add_service_ids {
        if !service_ids.contains(&added) {
            service_ids.push(added);
        }
    }
    service_ids.retain(|id| !request.remove_service_ids.contains(id));

    if service_ids.is_empty() {
        return Err(RebookError::Validation(
            "at least one service must remain selected".to_string(),
        ));
    }

    Ok((date, time, staff_id, service_ids, BookingSource::CustomizedRebook))
}
