use std::sync::Arc;

use serde_json::json;

use crate::commands::{command_context, CommandResult};
use crate::SweepJob;
use rebook_core::clock::SystemClock;
use rebook_db::repositories::{
    SqlBookingRepository, SqlProfileRepository, SqlSuggestionRepository,
};
use rebook_db::{connect, migrations};
use rebook_engine::{ExpiryReaper, SuggestionGenerator};

pub fn run(job: SweepJob) -> CommandResult {
    let (config, runtime) = match command_context("sweep") {
        Ok(context) => context,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let bookings = Arc::new(SqlBookingRepository::new(pool.clone()));
        let profiles = Arc::new(SqlProfileRepository::new(pool.clone()));
        let suggestions = Arc::new(SqlSuggestionRepository::new(pool.clone()));
        let clock = Arc::new(SystemClock);

        let run_result = match job {
            SweepJob::Daily => {
                SuggestionGenerator::new(profiles, suggestions, bookings, clock)
                    .run_daily_sweep()
                    .await
            }
            SweepJob::Expiry => ExpiryReaper::new(suggestions, clock).run_sweep().await,
        }
        .map_err(|error| ("sweep_execution", error.to_string(), 5u8));

        pool.close().await;
        run_result
    });

    let label = match job {
        SweepJob::Daily => "daily",
        SweepJob::Expiry => "expiry",
    };
    match result {
        Ok(processed) => CommandResult::success_with(
            "sweep",
            format!("{label} sweep finished"),
            Some(json!({ "job": label, "processed": processed })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}
