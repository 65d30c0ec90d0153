use sqlx::{QueryBuilder, Row, Sqlite};

use rebook_core::domain::directory::{Customer, Location, ServiceItem, StaffMember};
use rebook_core::domain::ids::{LocationId, ServiceId, StaffId, UserId};

use super::{decode_decimal, DirectoryRepository, RepositoryError};
use crate::DbPool;

/// Read-only access to the customer/location/service/staff directories.
/// These records are owned by the main booking product; this service only
/// resolves ids into presentable details and live prices.
pub struct SqlDirectoryRepository {
    pool: DbPool,
}

impl SqlDirectoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_ids(
        &self,
        table: &str,
        columns: &str,
        ids: &[String],
    ) -> Result<Vec<sqlx::sqlite::SqliteRow>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        builder.push(")");

        Ok(builder.build().fetch_all(&self.pool).await?)
    }
}

fn row_to_service(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceItem, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location_id: String =
        row.try_get("location_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let duration_minutes: i64 =
        row.try_get("duration_minutes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: bool =
        row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ServiceItem {
        id: ServiceId(id),
        location_id: LocationId(location_id),
        name,
        price: decode_decimal(&price)?,
        duration_minutes: u32::try_from(duration_minutes)
            .map_err(|_| RepositoryError::Decode(format!("invalid duration `{duration_minutes}`")))?,
        active,
    })
}

#[async_trait::async_trait]
impl DirectoryRepository for SqlDirectoryRepository {
    async fn find_customer(&self, id: &UserId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email FROM customer WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Customer {
                id: UserId(row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?),
                name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                email: row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            })
        })
        .transpose()
    }

    async fn find_location(&self, id: &LocationId) -> Result<Option<Location>, RepositoryError> {
        let locations = self.find_locations(std::slice::from_ref(id)).await?;
        Ok(locations.into_iter().next())
    }

    async fn find_locations(
        &self,
        ids: &[LocationId],
    ) -> Result<Vec<Location>, RepositoryError> {
        let ids: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let rows = self.fetch_by_ids("location", "id, name, timezone", &ids).await?;

        rows.into_iter()
            .map(|row| {
                Ok(Location {
                    id: LocationId(
                        row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    ),
                    name: row
                        .try_get("name")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    timezone: row
                        .try_get("timezone")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn find_services(
        &self,
        ids: &[ServiceId],
    ) -> Result<Vec<ServiceItem>, RepositoryError> {
        let ids: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let rows = self
            .fetch_by_ids("service", "id, location_id, name, price, duration_minutes, active", &ids)
            .await?;

        rows.iter().map(row_to_service).collect()
    }

    async fn find_staff(&self, ids: &[StaffId]) -> Result<Vec<StaffMember>, RepositoryError> {
        let ids: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let rows = self.fetch_by_ids("staff", "id, location_id, name, active", &ids).await?;

        rows.into_iter()
            .map(|row| {
                Ok(StaffMember {
                    id: StaffId(
                        row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    ),
                    location_id: LocationId(
                        row.try_get("location_id")
                            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    ),
                    name: row
                        .try_get("name")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    active: row
                        .try_get("active")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use rebook_core::domain::ids::{LocationId, ServiceId, StaffId, UserId};

    use super::SqlDirectoryRepository;
    use crate::repositories::DirectoryRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        for statement in [
            "INSERT INTO customer (id, name, email) \
             VALUES ('user-1', 'Dana Fields', 'dana@example.com')",
            "INSERT INTO location (id, name, timezone) \
             VALUES ('loc-1', 'Downtown Studio', 'America/New_York')",
            "INSERT INTO location (id, name) VALUES ('loc-2', 'Uptown Studio')",
            "INSERT INTO service (id, location_id, name, price, duration_minutes) \
             VALUES ('svc-cut', 'loc-1', 'Haircut', '45.00', 45)",
            "INSERT INTO service (id, location_id, name, price, duration_minutes) \
             VALUES ('svc-color', 'loc-1', 'Color', '120.00', 90)",
            "INSERT INTO staff (id, location_id, name) VALUES ('staff-1', 'loc-1', 'Alex Kim')",
        ] {
            sqlx::query(statement).execute(&pool).await.expect("seed");
        }
        pool
    }

    #[tokio::test]
    async fn finds_customer_with_email() {
        let pool = setup().await;
        let repo = SqlDirectoryRepository::new(pool);

        let customer = repo
            .find_customer(&UserId("user-1".to_string()))
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(customer.name, "Dana Fields");
        assert_eq!(customer.email.as_deref(), Some("dana@example.com"));

        let missing =
            repo.find_customer(&UserId("user-404".to_string())).await.expect("query");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn batch_location_fetch_returns_only_known_ids() {
        let pool = setup().await;
        let repo = SqlDirectoryRepository::new(pool);

        let locations = repo
            .find_locations(&[
                LocationId("loc-1".to_string()),
                LocationId("loc-404".to_string()),
            ])
            .await
            .expect("query");

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].name, "Downtown Studio");
        assert_eq!(locations[0].timezone.as_deref(), Some("America/New_York"));
    }

    #[tokio::test]
    async fn services_decode_exact_prices() {
        let pool = setup().await;
        let repo = SqlDirectoryRepository::new(pool);

        let services = repo
            .find_services(&[
                ServiceId("svc-cut".to_string()),
                ServiceId("svc-color".to_string()),
            ])
            .await
            .expect("query");

        assert_eq!(services.len(), 2);
        let cut = services.iter().find(|s| s.id.0 == "svc-cut").expect("cut exists");
        assert_eq!(cut.price, Decimal::new(4500, 2));
        assert!(cut.active);
    }

    #[tokio::test]
    async fn empty_id_set_short_circuits() {
        let pool = setup().await;
        let repo = SqlDirectoryRepository::new(pool);

        assert!(repo.find_staff(&[]).await.expect("query").is_empty());
        let staff =
            repo.find_staff(&[StaffId("staff-1".to_string())]).await.expect("query");
        assert_eq!(staff[0].name, "Alex Kim");
    }
}
