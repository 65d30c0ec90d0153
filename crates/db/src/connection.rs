use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use rebook_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Applied to every pooled connection. Foreign keys guard the
/// booking/suggestion cross references; WAL lets the sweep writers run
/// alongside feed reads.
const CONNECTION_PRAGMAS: &[&str] = &["PRAGMA foreign_keys = ON", "PRAGMA journal_mode = WAL"];

/// Open a pool sized and timed out per the service configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let timeout_secs = timeout_secs.max(1);
    // Statement-level busy waits stay shorter than pool acquisition so a
    // wedged writer surfaces as a timeout rather than a silent stall.
    let busy_timeout_ms = timeout_secs.min(5) * 1000;

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                for &pragma in CONNECTION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use rebook_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn connect_applies_pragmas_from_the_database_config() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 3,
        };
        let pool = connect(&config).await.expect("pool should connect");

        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("pragma query");
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("pragma query");
        assert_eq!(busy_timeout, 3_000);

        pool.close().await;
    }

    #[tokio::test]
    async fn busy_timeout_is_capped_below_the_acquire_timeout() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
        };
        let pool = connect(&config).await.expect("pool should connect");

        let busy_timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("pragma query");
        assert_eq!(busy_timeout, 5_000);

        pool.close().await;
    }
}
