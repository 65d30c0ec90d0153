use thiserror::Error;

use crate::domain::suggestion::SuggestionStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid suggestion transition from {from:?} to {to:?}")]
    InvalidSuggestionTransition { from: SuggestionStatus, to: SuggestionStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Outcome taxonomy for every exposed rebooking operation. All variants are
/// recoverable from the caller's point of view; infrastructure failures are
/// carried as `Persistence` and fail only the current request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RebookError {
    #[error("suggestion not found for this user")]
    NotFound,
    #[error("suggestion was already answered")]
    AlreadyUsed,
    #[error("suggestion has expired")]
    Expired,
    #[error("slot is no longer available")]
    SlotUnavailable,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("dependency no longer exists: {0}")]
    DependencyNotFound(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl RebookError {
    /// Safe, user-facing prompt for each outcome.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => "We couldn't find that suggestion.",
            Self::AlreadyUsed => "This suggestion has already been answered.",
            Self::Expired => "This offer has expired. Check back for a new suggestion.",
            Self::SlotUnavailable => {
                "That time was just taken. Please pick another time."
            }
            Self::Validation(_) => "The request could not be processed. Check inputs and try again.",
            Self::DependencyNotFound(_) => {
                "Part of this offer is no longer available. Please pick another time."
            }
            Self::Domain(_) => "The request could not be processed. Check inputs and try again.",
            Self::Persistence(_) => "The service is temporarily unavailable. Please retry shortly.",
        }
    }
}
