use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{LocationId, ServiceId, StaffId, UserId};

// Directory entities are owned elsewhere; this service only reads them.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub timezone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub id: ServiceId,
    pub location_id: LocationId,
    pub name: String,
    /// Current list price; estimated totals always use this, never the
    /// price paid historically.
    pub price: Decimal,
    pub duration_minutes: u32,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub location_id: LocationId,
    pub name: String,
    pub active: bool,
}
