use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use rebook_core::domain::booking::Booking;
use rebook_core::domain::directory::{Customer, Location, ServiceItem, StaffMember};
use rebook_core::domain::ids::{BookingId, LocationId, ServiceId, StaffId, SuggestionId, UserId};
use rebook_core::domain::profile::PreferenceProfile;
use rebook_core::domain::slot::Slot;
use rebook_core::domain::suggestion::Suggestion;

pub mod booking;
pub mod directory;
pub mod profile;
pub mod suggestion;

pub use booking::SqlBookingRepository;
pub use directory::SqlDirectoryRepository;
pub use profile::SqlProfileRepository;
pub use suggestion::SqlSuggestionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// What the commit transaction decided. The caller maps these onto the
/// user-facing error taxonomy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Booking inserted and suggestion marked accepted, atomically.
    Committed,
    /// Another commit already claimed the suggestion.
    SuggestionAlreadyClaimed,
    /// A conflicting booking occupies the resolved slot. Nothing was written.
    SlotConflict,
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(
        &self,
        user_id: &UserId,
        location_id: &LocationId,
    ) -> Result<Option<PreferenceProfile>, RepositoryError>;

    /// Profiles for one user, most recently visited location first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PreferenceProfile>, RepositoryError>;

    /// Every profile eligible for the daily generation sweep.
    async fn list_sweep_candidates(
        &self,
        min_completed_bookings: u32,
    ) -> Result<Vec<PreferenceProfile>, RepositoryError>;

    async fn upsert(&self, profile: &PreferenceProfile) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SuggestionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SuggestionId) -> Result<Option<Suggestion>, RepositoryError>;

    async fn insert(&self, suggestion: &Suggestion) -> Result<(), RepositoryError>;

    /// Active (pending or shown, unexpired) suggestions for a user, highest
    /// confidence first.
    async fn active_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Suggestion>, RepositoryError>;

    /// Whether an active suggestion already exists for the pair. Enforces
    /// the one-active-suggestion invariant in the generator.
    async fn has_active(
        &self,
        user_id: &UserId,
        location_id: &LocationId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// One-way pending -> shown flip for the given rows.
    async fn mark_shown(
        &self,
        ids: &[SuggestionId],
        shown_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Guarded dismissal: transitions only when the row is still pending or
    /// shown, returning whether a row actually changed.
    async fn dismiss(
        &self,
        id: &SuggestionId,
        responded_at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<bool, RepositoryError>;

    /// Bulk-expire every answerable suggestion whose expiry has passed.
    /// Returns how many rows flipped.
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;

    async fn insert(&self, booking: &Booking) -> Result<(), RepositoryError>;

    /// Completed bookings for a (user, location) pair, newest date first.
    async fn completed_history(
        &self,
        user_id: &UserId,
        location_id: &LocationId,
    ) -> Result<Vec<Booking>, RepositoryError>;

    /// Advisory check: is a pending/confirmed booking occupying this slot?
    async fn slot_taken(&self, slot: &Slot) -> Result<bool, RepositoryError>;

    /// Batch fetch of pending/confirmed bookings for a set of
    /// (location, date) pairs, for presentation-time availability checks.
    async fn occupying_on_dates(
        &self,
        pairs: &[(LocationId, NaiveDate)],
    ) -> Result<Vec<Booking>, RepositoryError>;

    /// The commit path: in one transaction, claim the suggestion (it must
    /// still be pending or shown), re-check the slot, insert the booking,
    /// and mark the suggestion accepted. Callers must hold the slot lock
    /// for `booking`'s slot across this call.
    async fn commit_rebooking(
        &self,
        booking: &Booking,
        suggestion_id: &SuggestionId,
        responded_at: DateTime<Utc>,
    ) -> Result<CommitOutcome, RepositoryError>;
}

#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn find_customer(&self, id: &UserId) -> Result<Option<Customer>, RepositoryError>;

    async fn find_location(&self, id: &LocationId) -> Result<Option<Location>, RepositoryError>;

    async fn find_locations(
        &self,
        ids: &[LocationId],
    ) -> Result<Vec<Location>, RepositoryError>;

    async fn find_services(&self, ids: &[ServiceId])
        -> Result<Vec<ServiceItem>, RepositoryError>;

    async fn find_staff(&self, ids: &[StaffId]) -> Result<Vec<StaffMember>, RepositoryError>;
}

pub(crate) fn decode_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    value.parse().map_err(|_| RepositoryError::Decode(format!("invalid date `{value}`")))
}

pub(crate) fn decode_time(value: &str) -> Result<NaiveTime, RepositoryError> {
    value.parse().map_err(|_| RepositoryError::Decode(format!("invalid time `{value}`")))
}

pub(crate) fn decode_datetime(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RepositoryError::Decode(format!("invalid timestamp `{value}`")))
}

pub(crate) fn decode_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    value.parse().map_err(|_| RepositoryError::Decode(format!("invalid decimal `{value}`")))
}

pub(crate) fn decode_id_list(value: &str) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|_| RepositoryError::Decode(format!("invalid id list `{value}`")))
}

pub(crate) fn encode_id_list(ids: &[String]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}
