use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{BookingId, LocationId, ServiceId, StaffId, UserId};
use crate::domain::slot::Slot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Statuses that occupy a slot and therefore block another booking into it.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

/// How a booking entered the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    Direct,
    QuickRebook,
    CustomizedRebook,
}

impl BookingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::QuickRebook => "quick_rebook",
            Self::CustomizedRebook => "customized_rebook",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "direct" => Some(Self::Direct),
            "quick_rebook" => Some(Self::QuickRebook),
            "customized_rebook" => Some(Self::CustomizedRebook),
            _ => None,
        }
    }
}

/// An appointment at a location. Walk-in bookings may lack a user; imported
/// rows may lack a location. Such bookings never feed preference learning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: Option<UserId>,
    pub location_id: Option<LocationId>,
    pub service_ids: Vec<ServiceId>,
    pub staff_id: Option<StaffId>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: BookingStatus,
    pub total_price: Decimal,
    pub source: BookingSource,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// The physical slot this booking occupies, when a location is known.
    pub fn slot(&self) -> Option<Slot> {
        self.location_id.as_ref().map(|location_id| Slot {
            location_id: location_id.clone(),
            date: self.date,
            time: self.time,
            staff_id: self.staff_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BookingSource, BookingStatus};

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("unknown"), None);
    }

    #[test]
    fn only_pending_and_confirmed_occupy_slots() {
        assert!(BookingStatus::Pending.occupies_slot());
        assert!(BookingStatus::Confirmed.occupies_slot());
        assert!(!BookingStatus::Completed.occupies_slot());
        assert!(!BookingStatus::Cancelled.occupies_slot());
    }

    #[test]
    fn source_round_trips_through_strings() {
        for source in
            [BookingSource::Direct, BookingSource::QuickRebook, BookingSource::CustomizedRebook]
        {
            assert_eq!(BookingSource::parse(source.as_str()), Some(source));
        }
    }
}
