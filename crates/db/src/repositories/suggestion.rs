use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

use rebook_core::domain::ids::{BookingId, LocationId, ServiceId, StaffId, SuggestionId, UserId};
use rebook_core::domain::suggestion::{Suggestion, SuggestionStatus};

use super::{
    decode_date, decode_datetime, decode_id_list, decode_time, encode_id_list,
    RepositoryError, SuggestionRepository,
};
use crate::DbPool;

pub struct SqlSuggestionRepository {
    pool: DbPool,
}

impl SqlSuggestionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SUGGESTION_COLUMNS: &str =
    "id, user_id, location_id, suggested_date, suggested_time, service_ids, staff_id, \
     confidence_score, reason, expires_at, status, shown_at, responded_at, \
     resulting_booking_id, dismissal_reason, created_at";

fn row_to_suggestion(row: &sqlx::sqlite::SqliteRow) -> Result<Suggestion, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location_id: String =
        row.try_get("location_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let suggested_date: String =
        row.try_get("suggested_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let suggested_time: String =
        row.try_get("suggested_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_ids: String =
        row.try_get("service_ids").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let staff_id: Option<String> =
        row.try_get("staff_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let confidence_score: i64 =
        row.try_get("confidence_score").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reason: String =
        row.try_get("reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expires_at: String =
        row.try_get("expires_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let shown_at: Option<String> =
        row.try_get("shown_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let responded_at: Option<String> =
        row.try_get("responded_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resulting_booking_id: Option<String> =
        row.try_get("resulting_booking_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let dismissal_reason: Option<String> =
        row.try_get("dismissal_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Suggestion {
        id: SuggestionId(id),
        user_id: UserId(user_id),
        location_id: LocationId(location_id),
        suggested_date: decode_date(&suggested_date)?,
        suggested_time: decode_time(&suggested_time)?,
        service_ids: decode_id_list(&service_ids)?.into_iter().map(ServiceId).collect(),
        staff_id: staff_id.map(StaffId),
        confidence_score: u8::try_from(confidence_score).map_err(|_| {
            RepositoryError::Decode(format!("confidence score out of range: {confidence_score}"))
        })?,
        reason,
        expires_at: decode_datetime(&expires_at)?,
        status: SuggestionStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown suggestion status `{status}`"))
        })?,
        shown_at: shown_at.as_deref().map(decode_datetime).transpose()?,
        responded_at: responded_at.as_deref().map(decode_datetime).transpose()?,
        resulting_booking_id: resulting_booking_id.map(BookingId),
        dismissal_reason,
        created_at: decode_datetime(&created_at)?,
    })
}

#[async_trait::async_trait]
impl SuggestionRepository for SqlSuggestionRepository {
    async fn find_by_id(&self, id: &SuggestionId) -> Result<Option<Suggestion>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {SUGGESTION_COLUMNS} FROM suggestion WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_suggestion).transpose()
    }

    async fn insert(&self, suggestion: &Suggestion) -> Result<(), RepositoryError> {
        let service_ids = encode_id_list(
            &suggestion.service_ids.iter().map(|s| s.0.clone()).collect::<Vec<_>>(),
        );

        sqlx::query(
            "INSERT INTO suggestion
                (id, user_id, location_id, suggested_date, suggested_time, service_ids,
                 staff_id, confidence_score, reason, expires_at, status, shown_at,
                 responded_at, resulting_booking_id, dismissal_reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&suggestion.id.0)
        .bind(&suggestion.user_id.0)
        .bind(&suggestion.location_id.0)
        .bind(suggestion.suggested_date.to_string())
        .bind(suggestion.suggested_time.to_string())
        .bind(&service_ids)
        .bind(suggestion.staff_id.as_ref().map(|id| id.0.as_str()))
        .bind(i64::from(suggestion.confidence_score))
        .bind(&suggestion.reason)
        .bind(suggestion.expires_at.to_rfc3339())
        .bind(suggestion.status.as_str())
        .bind(suggestion.shown_at.map(|at| at.to_rfc3339()))
        .bind(suggestion.responded_at.map(|at| at.to_rfc3339()))
        .bind(suggestion.resulting_booking_id.as_ref().map(|id| id.0.as_str()))
        .bind(suggestion.dismissal_reason.as_deref())
        .bind(suggestion.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn active_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Suggestion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM suggestion
             WHERE user_id = ? AND status IN ('pending', 'shown') AND expires_at > ?
             ORDER BY confidence_score DESC, created_at ASC
             LIMIT ?",
        ))
        .bind(&user_id.0)
        .bind(now.to_rfc3339())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_suggestion).collect()
    }

    async fn has_active(
        &self,
        user_id: &UserId,
        location_id: &LocationId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM suggestion
             WHERE user_id = ? AND location_id = ?
               AND status IN ('pending', 'shown') AND expires_at > ?",
        )
        .bind(&user_id.0)
        .bind(&location_id.0)
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn mark_shown(
        &self,
        ids: &[SuggestionId],
        shown_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "UPDATE suggestion SET status = 'shown', shown_at = ",
        );
        builder.push_bind(shown_at.to_rfc3339());
        builder.push(" WHERE status = 'pending' AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.0.clone());
        }
        builder.push(")");

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn dismiss(
        &self,
        id: &SuggestionId,
        responded_at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let affected = sqlx::query(
            "UPDATE suggestion
             SET status = 'dismissed', responded_at = ?, dismissal_reason = ?
             WHERE id = ? AND status IN ('pending', 'shown')",
        )
        .bind(responded_at.to_rfc3339())
        .bind(reason)
        .bind(&id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let affected = sqlx::query(
            "UPDATE suggestion
             SET status = 'expired'
             WHERE status IN ('pending', 'shown') AND expires_at <= ?",
        )
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};

    use rebook_core::domain::ids::{LocationId, ServiceId, SuggestionId, UserId};
    use rebook_core::domain::suggestion::{Suggestion, SuggestionStatus};

    use super::SqlSuggestionRepository;
    use crate::repositories::SuggestionRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query("INSERT INTO customer (id, name) VALUES ('user-1', 'Dana Fields')")
            .execute(&pool)
            .await
            .expect("seed customer");
        sqlx::query("INSERT INTO location (id, name) VALUES ('loc-1', 'Downtown Studio')")
            .execute(&pool)
            .await
            .expect("seed location");
        sqlx::query("INSERT INTO location (id, name) VALUES ('loc-2', 'Uptown Studio')")
            .execute(&pool)
            .await
            .expect("seed location");
        pool
    }

    fn suggestion(id: &str, location: &str, score: u8, expires_in_hours: i64) -> Suggestion {
        Suggestion {
            id: SuggestionId(id.to_string()),
            user_id: UserId("user-1".to_string()),
            location_id: LocationId(location.to_string()),
            suggested_date: NaiveDate::from_ymd_opt(2024, 3, 11).expect("valid date"),
            suggested_time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
            service_ids: vec![ServiceId("svc-cut".to_string())],
            staff_id: None,
            confidence_score: score,
            reason: "due soon".to_string(),
            expires_at: Utc::now() + Duration::hours(expires_in_hours),
            status: SuggestionStatus::Pending,
            shown_at: None,
            responded_at: None,
            resulting_booking_id: None,
            dismissal_reason: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let pool = setup().await;
        let repo = SqlSuggestionRepository::new(pool);

        let original = suggestion("sug-1", "loc-1", 80, 24);
        repo.insert(&original).await.expect("insert");

        let found = repo
            .find_by_id(&SuggestionId("sug-1".to_string()))
            .await
            .expect("find")
            .expect("exists");

        assert_eq!(found.user_id, original.user_id);
        assert_eq!(found.confidence_score, 80);
        assert_eq!(found.status, SuggestionStatus::Pending);
        assert_eq!(found.service_ids, original.service_ids);
    }

    #[tokio::test]
    async fn active_for_user_orders_by_confidence_and_skips_expired() {
        let pool = setup().await;
        let repo = SqlSuggestionRepository::new(pool);

        repo.insert(&suggestion("sug-low", "loc-1", 60, 24)).await.expect("insert");
        repo.insert(&suggestion("sug-high", "loc-2", 90, 24)).await.expect("insert");
        repo.insert(&suggestion("sug-stale", "loc-1", 99, -1)).await.expect("insert");

        let active = repo
            .active_for_user(&UserId("user-1".to_string()), Utc::now(), 10)
            .await
            .expect("active");

        assert_eq!(
            active.iter().map(|s| s.id.0.as_str()).collect::<Vec<_>>(),
            vec!["sug-high", "sug-low"]
        );
    }

    #[tokio::test]
    async fn has_active_scopes_to_location() {
        let pool = setup().await;
        let repo = SqlSuggestionRepository::new(pool);
        let user = UserId("user-1".to_string());

        repo.insert(&suggestion("sug-1", "loc-1", 70, 24)).await.expect("insert");

        assert!(repo
            .has_active(&user, &LocationId("loc-1".to_string()), Utc::now())
            .await
            .expect("check"));
        assert!(!repo
            .has_active(&user, &LocationId("loc-2".to_string()), Utc::now())
            .await
            .expect("check"));
    }

    #[tokio::test]
    async fn expired_rows_are_not_active_even_before_the_reaper_runs() {
        let pool = setup().await;
        let repo = SqlSuggestionRepository::new(pool);
        let user = UserId("user-1".to_string());

        repo.insert(&suggestion("sug-1", "loc-1", 70, -1)).await.expect("insert");

        assert!(!repo
            .has_active(&user, &LocationId("loc-1".to_string()), Utc::now())
            .await
            .expect("check"));
    }

    #[tokio::test]
    async fn mark_shown_flips_only_pending_rows() {
        let pool = setup().await;
        let repo = SqlSuggestionRepository::new(pool);

        let mut dismissed = suggestion("sug-done", "loc-2", 70, 24);
        dismissed.status = SuggestionStatus::Dismissed;
        repo.insert(&suggestion("sug-1", "loc-1", 70, 24)).await.expect("insert");
        repo.insert(&dismissed).await.expect("insert");

        repo.mark_shown(
            &[SuggestionId("sug-1".to_string()), SuggestionId("sug-done".to_string())],
            Utc::now(),
        )
        .await
        .expect("mark shown");

        let shown = repo
            .find_by_id(&SuggestionId("sug-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(shown.status, SuggestionStatus::Shown);
        assert!(shown.shown_at.is_some());

        let untouched = repo
            .find_by_id(&SuggestionId("sug-done".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(untouched.status, SuggestionStatus::Dismissed);
    }

    #[tokio::test]
    async fn dismiss_is_guarded_by_status() {
        let pool = setup().await;
        let repo = SqlSuggestionRepository::new(pool);

        repo.insert(&suggestion("sug-1", "loc-1", 70, 24)).await.expect("insert");

        let first = repo
            .dismiss(&SuggestionId("sug-1".to_string()), Utc::now(), Some("too busy"))
            .await
            .expect("dismiss");
        assert!(first);

        let second = repo
            .dismiss(&SuggestionId("sug-1".to_string()), Utc::now(), None)
            .await
            .expect("dismiss again");
        assert!(!second);

        let row = repo
            .find_by_id(&SuggestionId("sug-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(row.status, SuggestionStatus::Dismissed);
        assert_eq!(row.dismissal_reason.as_deref(), Some("too busy"));
        assert!(row.responded_at.is_some());
    }

    #[tokio::test]
    async fn expire_stale_flips_pending_and_shown_past_expiry() {
        let pool = setup().await;
        let repo = SqlSuggestionRepository::new(pool);

        let mut shown_stale = suggestion("sug-shown", "loc-2", 70, -2);
        shown_stale.status = SuggestionStatus::Shown;
        repo.insert(&suggestion("sug-pending", "loc-1", 70, -1)).await.expect("insert");
        repo.insert(&shown_stale).await.expect("insert");
        repo.insert(&suggestion("sug-fresh", "loc-1", 70, 24)).await.expect("insert");

        let flipped = repo.expire_stale(Utc::now()).await.expect("expire");
        assert_eq!(flipped, 2);

        // Idempotent: nothing left to flip.
        let again = repo.expire_stale(Utc::now()).await.expect("expire again");
        assert_eq!(again, 0);

        let fresh = repo
            .find_by_id(&SuggestionId("sug-fresh".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(fresh.status, SuggestionStatus::Pending);
    }
}
