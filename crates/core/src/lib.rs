pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod learning;
pub mod scoring;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::booking::{Booking, BookingSource, BookingStatus};
pub use domain::directory::{Customer, Location, ServiceItem, StaffMember};
pub use domain::ids::{BookingId, LocationId, ServiceId, StaffId, SuggestionId, UserId};
pub use domain::profile::{PreferenceProfile, TimeBucket};
pub use domain::slot::Slot;
pub use domain::suggestion::{Suggestion, SuggestionStatus};
pub use errors::{DomainError, RebookError};
pub use learning::LearnedPreferences;
