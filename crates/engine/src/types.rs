use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rebook_core::domain::ids::{BookingId, LocationId, ServiceId, StaffId, SuggestionId};
use rebook_core::domain::suggestion::SuggestionStatus;

/// What `get_suggestions` returns: actionable suggestions plus informational
/// last-visit summaries.
#[derive(Clone, Debug, Serialize)]
pub struct SuggestionFeed {
    pub suggestions: Vec<PresentedSuggestion>,
    pub last_visits: Vec<LastVisit>,
}

/// A live suggestion enriched with directory details and a re-validated,
/// advisory availability flag. Only the lock-guarded commit check decides
/// whether a booking actually succeeds.
#[derive(Clone, Debug, Serialize)]
pub struct PresentedSuggestion {
    pub id: SuggestionId,
    pub location_id: LocationId,
    pub location_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub services: Vec<ServiceDetail>,
    pub staff_id: Option<StaffId>,
    pub staff_name: Option<String>,
    pub confidence_score: u8,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub status: SuggestionStatus,
    /// Sum of current service prices, not what the customer paid before.
    pub estimated_total: Decimal,
    pub available: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceDetail {
    pub id: ServiceId,
    pub name: String,
    pub price: Decimal,
}

/// Informational summary of a customer's standing at one location. Not
/// actionable; derived straight from the preference profile.
#[derive(Clone, Debug, Serialize)]
pub struct LastVisit {
    pub location_id: LocationId,
    pub location_name: String,
    pub last_visit_date: NaiveDate,
    pub days_since: i64,
    pub preferred_services: Vec<String>,
    pub preferred_staff_name: Option<String>,
}

/// Slot and service overrides for `customize_suggestion`. Unset fields keep
/// the suggested values; the final service set must stay non-empty.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CustomizeRequest {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub staff_id: Option<StaffId>,
    #[serde(default)]
    pub add_service_ids: Vec<ServiceId>,
    #[serde(default)]
    pub remove_service_ids: Vec<ServiceId>,
}

/// Receipt for a successful rebooking commit.
#[derive(Clone, Debug, Serialize)]
pub struct ConfirmedRebooking {
    pub booking_id: BookingId,
    pub location_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub services: Vec<ServiceDetail>,
    pub staff_name: Option<String>,
    pub total: Decimal,
}
