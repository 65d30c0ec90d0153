use std::sync::Arc;

use tracing::info;

use rebook_core::clock::Clock;
use rebook_core::errors::RebookError;
use rebook_db::repositories::SuggestionRepository;

use crate::persistence;

/// Flips answerable suggestions to expired once their window closes. Runs
/// periodically; the accept path also checks expiry, so the reaper is
/// housekeeping, not the enforcement point.
pub struct ExpiryReaper {
    suggestions: Arc<dyn SuggestionRepository>,
    clock: Arc<dyn Clock>,
}

impl ExpiryReaper {
    pub fn new(suggestions: Arc<dyn SuggestionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { suggestions, clock }
    }

    /// Expire everything past its window. Returns how many rows flipped.
    pub async fn run_sweep(&self) -> Result<u64, RebookError> {
        let now = self.clock.now();
        let expired = self.suggestions.expire_stale(now).await.map_err(persistence)?;

        if expired > 0 {
            info!(
                event_name = "rebook.reaper.sweep_finished",
                expired,
                "expired stale suggestions"
            );
        }
        Ok(expired)
    }
}
