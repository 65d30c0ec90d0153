use crate::commands::{command_context, CommandResult};
use rebook_db::{connect, migrations};

pub fn run() -> CommandResult {
    let (config, runtime) = match command_context("migrate") {
        Ok(context) => context,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let run_result = migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8));

        pool.close().await;
        run_result
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "database migrations applied"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
