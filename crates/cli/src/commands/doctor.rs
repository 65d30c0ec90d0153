use serde::Serialize;

use crate::commands::CommandResult;
use rebook_core::config::{AppConfig, LoadOptions};
use rebook_db::{connect, DbPool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

/// Readiness diagnosis: configuration, database connectivity, and whether
/// migrations were applied. A config failure is reported as a check, not an
/// abort, so the operator sees the full picture in one run.
pub fn run() -> CommandResult {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let mut checks = vec![DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            }];
            checks.extend(database_checks(&config));
            checks
        }
        Err(error) => vec![
            DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            },
            skipped("database_connectivity", "configuration did not load"),
            skipped("schema_migrations", "configuration did not load"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let data = serde_json::to_value(&checks).ok();
    if all_pass {
        CommandResult::success_with("doctor", "all readiness checks passed", data)
    } else {
        CommandResult::failure_with(
            "doctor",
            "readiness",
            "one or more readiness checks failed",
            1,
            data,
        )
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped: {reason}") }
}

fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                skipped("schema_migrations", "async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!(
                            "failed to connect using `{}`: {error}",
                            config.database.url
                        ),
                    },
                    skipped("schema_migrations", "database is unreachable"),
                ];
            }
        };

        let connectivity = DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        };
        let schema = schema_check(&pool).await;
        pool.close().await;

        vec![connectivity, schema]
    })
}

async fn schema_check(pool: &DbPool) -> DoctorCheck {
    let found: Result<i64, sqlx::Error> = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
         AND name IN ('booking', 'preference_profile', 'suggestion')",
    )
    .fetch_one(pool)
    .await;

    match found {
        Ok(3) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Pass,
            details: "suggestion pipeline tables present".to_string(),
        },
        Ok(count) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: format!("{count} of 3 pipeline tables present; run `rebook migrate`"),
        },
        Err(error) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: format!("schema query failed: {error}"),
        },
    }
}
