use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use rebook_core::config::JobsConfig;
use rebook_engine::{ExpiryReaper, SuggestionGenerator};

/// Start the in-process sweep loops. The admin endpoints can trigger the
/// same sweeps on demand; both paths are idempotent.
pub fn spawn(generator: Arc<SuggestionGenerator>, reaper: Arc<ExpiryReaper>, jobs: &JobsConfig) {
    info!(
        event_name = "system.jobs.start",
        generator_interval_secs = jobs.generator_interval_secs,
        reaper_interval_secs = jobs.reaper_interval_secs,
        run_on_start = jobs.run_on_start,
        "background sweep loops started"
    );

    let run_on_start = jobs.run_on_start;
    let generator_interval = Duration::from_secs(jobs.generator_interval_secs);
    let reaper_interval = Duration::from_secs(jobs.reaper_interval_secs);

    tokio::spawn(async move {
        let mut ticker = interval(generator_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !run_on_start {
            ticker.tick().await;
        }
        loop {
            ticker.tick().await;
            match generator.run_daily_sweep().await {
                Ok(created) => {
                    info!(event_name = "system.jobs.generator_tick", created, "daily sweep ran")
                }
                Err(error) => warn!(
                    event_name = "system.jobs.generator_failed",
                    error = %error,
                    "daily sweep failed, will retry next tick"
                ),
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = interval(reaper_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !run_on_start {
            ticker.tick().await;
        }
        loop {
            ticker.tick().await;
            match reaper.run_sweep().await {
                Ok(expired) => {
                    info!(event_name = "system.jobs.reaper_tick", expired, "expiry sweep ran")
                }
                Err(error) => warn!(
                    event_name = "system.jobs.reaper_failed",
                    error = %error,
                    "expiry sweep failed, will retry next tick"
                ),
            }
        }
    });
}
