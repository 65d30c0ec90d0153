use serde_json::json;

use crate::commands::{command_context, CommandResult};
use rebook_db::{connect, migrations, DemoSeedDataset};

pub fn run() -> CommandResult {
    let (config, runtime) = match command_context("seed") {
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

        let summary = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verified = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verified {
            Ok(summary)
        } else {
            Err(("seed_verification", "seed rows missing after load".to_string(), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(summary) => CommandResult::success_with(
            "seed",
            "demo dataset loaded",
            Some(json!({
                "customers": summary.customers,
                "bookings": summary.bookings,
                "profiles": summary.profiles,
            })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
