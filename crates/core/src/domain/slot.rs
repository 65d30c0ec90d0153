use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{LocationId, StaffId};

/// The physical appointment slot a booking occupies: one location, one date,
/// one start time, and either a named staff member or "unassigned".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub location_id: LocationId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub staff_id: Option<StaffId>,
}

impl Slot {
    /// Deterministic lock key for this slot. Every commit attempt into the
    /// same (location, date, time, staff-or-unassigned) tuple derives the
    /// same key, regardless of which suggestion or code path it came from.
    pub fn lock_key(&self) -> u64 {
        let staff = self.staff_id.as_ref().map_or("unassigned", |staff| staff.0.as_str());
        let material =
            format!("slot:{}:{}:{}:{}", self.location_id.0, self.date, self.time, staff);
        let digest = blake3::hash(material.as_bytes());
        let bytes = digest.as_bytes();
        u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    }
}
