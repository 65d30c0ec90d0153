pub mod committer;
pub mod generator;
pub mod learner;
pub mod presenter;
pub mod reaper;
pub mod slot_lock;
pub mod types;

pub use committer::BookingCommitter;
pub use generator::SuggestionGenerator;
pub use learner::PreferenceLearner;
pub use presenter::SuggestionPresenter;
pub use reaper::ExpiryReaper;
pub use slot_lock::SlotLockRegistry;
pub use types::{
    ConfirmedRebooking, CustomizeRequest, LastVisit, PresentedSuggestion, ServiceDetail,
    SuggestionFeed,
};

use rebook_core::errors::RebookError;
use rebook_db::repositories::RepositoryError;

pub(crate) fn persistence(error: RepositoryError) -> RebookError {
    RebookError::Persistence(error.to_string())
}
