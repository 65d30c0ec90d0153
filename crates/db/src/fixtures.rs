use crate::repositories::RepositoryError;
use crate::DbPool;

/// Deterministic demo dataset: one salon location with staff and services,
/// two returning customers with enough completed history to produce
/// suggestions on the next daily sweep, and one brand-new customer who
/// must never receive one.
pub struct DemoSeedDataset;

const SEED_SQL: &str = r#"
INSERT OR IGNORE INTO customer (id, name, email) VALUES
    ('cust-dana', 'Dana Fields', 'dana@example.com'),
    ('cust-omar', 'Omar Reyes', 'omar@example.com'),
    ('cust-lee', 'Lee Park', NULL);

INSERT OR IGNORE INTO location (id, name, timezone) VALUES
    ('loc-downtown', 'Downtown Studio', 'America/New_York');

INSERT OR IGNORE INTO staff (id, location_id, name, active) VALUES
    ('staff-alex', 'loc-downtown', 'Alex Kim', 1),
    ('staff-jo', 'loc-downtown', 'Jo Morgan', 1);

INSERT OR IGNORE INTO service (id, location_id, name, price, duration_minutes, active) VALUES
    ('svc-cut', 'loc-downtown', 'Haircut', '45.00', 45, 1),
    ('svc-color', 'loc-downtown', 'Full Color', '120.00', 90, 1),
    ('svc-blowout', 'loc-downtown', 'Blowout', '35.00', 30, 1);

INSERT OR IGNORE INTO booking
    (id, user_id, location_id, service_ids, staff_id, booking_date, booking_time,
     status, total_price, source, created_at)
VALUES
    ('bk-dana-1', 'cust-dana', 'loc-downtown', '["svc-cut"]', 'staff-alex',
     '2024-01-08', '10:00:00', 'completed', '45.00', 'direct', '2024-01-01T09:00:00+00:00'),
    ('bk-dana-2', 'cust-dana', 'loc-downtown', '["svc-cut","svc-blowout"]', 'staff-alex',
     '2024-02-05', '10:00:00', 'completed', '80.00', 'direct', '2024-01-29T09:00:00+00:00'),
    ('bk-dana-3', 'cust-dana', 'loc-downtown', '["svc-cut"]', 'staff-alex',
     '2024-03-04', '10:00:00', 'completed', '45.00', 'direct', '2024-02-26T09:00:00+00:00'),
    ('bk-omar-1', 'cust-omar', 'loc-downtown', '["svc-color"]', 'staff-jo',
     '2024-02-14', '17:30:00', 'completed', '120.00', 'direct', '2024-02-07T12:00:00+00:00'),
    ('bk-omar-2', 'cust-omar', 'loc-downtown', '["svc-color"]', 'staff-jo',
     '2024-03-27', '17:30:00', 'completed', '120.00', 'direct', '2024-03-20T12:00:00+00:00'),
    ('bk-lee-1', 'cust-lee', 'loc-downtown', '["svc-cut"]', NULL,
     '2024-03-30', '14:00:00', 'completed', '45.00', 'direct', '2024-03-25T08:00:00+00:00');

INSERT OR IGNORE INTO preference_profile
    (user_id, location_id, preferred_staff_id, preferred_service_ids,
     preferred_day_of_week, preferred_time_bucket, preferred_time_exact,
     average_interval_days, last_booking_id, last_booking_date,
     total_completed_bookings, total_spent, updated_at)
VALUES
    ('cust-dana', 'loc-downtown', 'staff-alex', '["svc-cut","svc-blowout"]',
     0, 'morning', '10:00:00', 28, 'bk-dana-3', '2024-03-04',
     3, '170.00', '2024-03-04T11:00:00+00:00'),
    ('cust-omar', 'loc-downtown', 'staff-jo', '["svc-color"]',
     2, 'evening', '17:30:00', 42, 'bk-omar-2', '2024-03-27',
     2, '240.00', '2024-03-27T19:00:00+00:00'),
    ('cust-lee', 'loc-downtown', NULL, '["svc-cut"]',
     5, 'afternoon', '14:00:00', 30, 'bk-lee-1', '2024-03-30',
     1, '45.00', '2024-03-30T15:00:00+00:00');
"#;

const SEED_CUSTOMER_IDS: &[&str] = &["cust-dana", "cust-omar", "cust-lee"];
const SEED_BOOKING_COUNT: i64 = 6;
const SEED_PROFILE_COUNT: i64 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub customers: usize,
    pub bookings: i64,
    pub profiles: i64,
}

impl DemoSeedDataset {
    /// Load the demo fixtures in one transaction. Re-running is a no-op.
    pub async fn load(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(SEED_SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(SeedSummary {
            customers: SEED_CUSTOMER_IDS.len(),
            bookings: SEED_BOOKING_COUNT,
            profiles: SEED_PROFILE_COUNT,
        })
    }

    /// Verify the dataset is present and intact.
    pub async fn verify(pool: &DbPool) -> Result<bool, RepositoryError> {
        let bookings: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM booking WHERE id LIKE 'bk-%'",
        )
        .fetch_one(pool)
        .await?;

        let profiles: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM preference_profile WHERE user_id LIKE 'cust-%'",
        )
        .fetch_one(pool)
        .await?;

        Ok(bookings == SEED_BOOKING_COUNT && profiles == SEED_PROFILE_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::DemoSeedDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn load_then_verify_succeeds() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let summary = DemoSeedDataset::load(&pool).await.expect("load");
        assert_eq!(summary.customers, 3);
        assert!(DemoSeedDataset::verify(&pool).await.expect("verify"));
    }

    #[tokio::test]
    async fn reloading_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        DemoSeedDataset::load(&pool).await.expect("first load");
        DemoSeedDataset::load(&pool).await.expect("second load");

        let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM booking")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(bookings, 6);
    }
}
