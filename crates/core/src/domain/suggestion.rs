use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{BookingId, LocationId, ServiceId, StaffId, SuggestionId, UserId};
use crate::domain::slot::Slot;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Shown,
    Accepted,
    Dismissed,
    Expired,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shown => "shown",
            Self::Accepted => "accepted",
            Self::Dismissed => "dismissed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "shown" => Some(Self::Shown),
            "accepted" => Some(Self::Accepted),
            "dismissed" => Some(Self::Dismissed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Accepted, dismissed, and expired suggestions never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Dismissed | Self::Expired)
    }
}

/// A system-proposed future appointment derived from a preference profile.
///
/// The proposal fields are fixed at creation; only the lifecycle fields
/// change afterwards, and only along the persisted state machine below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub user_id: UserId,
    pub location_id: LocationId,
    pub suggested_date: NaiveDate,
    pub suggested_time: NaiveTime,
    pub service_ids: Vec<ServiceId>,
    pub staff_id: Option<StaffId>,
    /// Heuristic relevance estimate, 0 to 100.
    pub confidence_score: u8,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub status: SuggestionStatus,
    pub shown_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub resulting_booking_id: Option<BookingId>,
    pub dismissal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        matches!(
            (self.status, next),
            (Pending, Shown)
                | (Pending, Accepted)
                | (Pending, Dismissed)
                | (Pending, Expired)
                | (Shown, Accepted)
                | (Shown, Dismissed)
                | (Shown, Expired)
        )
    }

    pub fn transition_to(&mut self, next: SuggestionStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidSuggestionTransition { from: self.status, to: next })
    }

    /// Active means still answerable: pending or shown, and not yet past
    /// its expiry instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.expires_at > now
    }

    pub fn slot(&self) -> Slot {
        Slot {
            location_id: self.location_id.clone(),
            date: self.suggested_date,
            time: self.suggested_time,
            staff_id: self.staff_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};

    use crate::domain::ids::{LocationId, ServiceId, SuggestionId, UserId};

    use super::{Suggestion, SuggestionStatus};

    fn suggestion(status: SuggestionStatus) -> Suggestion {
        Suggestion {
            id: SuggestionId("sug-1".to_string()),
            user_id: UserId("user-1".to_string()),
            location_id: LocationId("loc-1".to_string()),
            suggested_date: NaiveDate::from_ymd_opt(2024, 2, 5).expect("valid date"),
            suggested_time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
            service_ids: vec![ServiceId("svc-1".to_string())],
            staff_id: None,
            confidence_score: 75,
            reason: "due soon".to_string(),
            expires_at: Utc::now() + Duration::days(7),
            status,
            shown_at: None,
            responded_at: None,
            resulting_booking_id: None,
            dismissal_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_can_be_shown_then_accepted() {
        let mut sug = suggestion(SuggestionStatus::Pending);
        sug.transition_to(SuggestionStatus::Shown).expect("pending -> shown");
        sug.transition_to(SuggestionStatus::Accepted).expect("shown -> accepted");
        assert_eq!(sug.status, SuggestionStatus::Accepted);
    }

    #[test]
    fn terminal_statuses_reject_all_transitions() {
        for status in
            [SuggestionStatus::Accepted, SuggestionStatus::Dismissed, SuggestionStatus::Expired]
        {
            let mut sug = suggestion(status);
            for next in [
                SuggestionStatus::Pending,
                SuggestionStatus::Shown,
                SuggestionStatus::Accepted,
                SuggestionStatus::Dismissed,
                SuggestionStatus::Expired,
            ] {
                assert!(sug.transition_to(next).is_err(), "{status:?} -> {next:?} must fail");
            }
        }
    }

    #[test]
    fn shown_cannot_revert_to_pending() {
        let mut sug = suggestion(SuggestionStatus::Shown);
        assert!(sug.transition_to(SuggestionStatus::Pending).is_err());
    }

    #[test]
    fn activity_respects_expiry_instant() {
        let now = Utc::now();
        let mut sug = suggestion(SuggestionStatus::Pending);
        assert!(sug.is_active_at(now));

        sug.expires_at = now - Duration::minutes(1);
        assert!(!sug.is_active_at(now));

        sug.expires_at = now + Duration::days(1);
        sug.status = SuggestionStatus::Dismissed;
        assert!(!sug.is_active_at(now));
    }
}
