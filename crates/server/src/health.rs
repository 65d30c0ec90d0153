use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use rebook_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

/// Tables the suggestion pipeline cannot run without. A partial count means
/// migrations were not applied against this database.
const CORE_TABLES: &[&str] = &["booking", "preference_profile", "suggestion"];

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let schema = if database.status == "ready" {
        schema_check(&state.db_pool).await
    } else {
        HealthCheck {
            status: "degraded",
            detail: "skipped: database is unreachable".to_string(),
        }
    };
    let ready = database.status == "ready" && schema.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        schema,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn schema_check(pool: &DbPool) -> HealthCheck {
    let query = "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type = 'table' AND name IN (?1, ?2, ?3)";
    let found = sqlx::query_scalar::<_, i64>(query)
        .bind(CORE_TABLES[0])
        .bind(CORE_TABLES[1])
        .bind(CORE_TABLES[2])
        .fetch_one(pool)
        .await;

    match found {
        Ok(count) if count == CORE_TABLES.len() as i64 => HealthCheck {
            status: "ready",
            detail: "suggestion pipeline tables present".to_string(),
        },
        Ok(count) => HealthCheck {
            status: "degraded",
            detail: format!(
                "{count} of {} pipeline tables present; run `rebook migrate`",
                CORE_TABLES.len()
            ),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("schema query failed: {error}") }
        }
    }
}
