use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

use rebook_core::domain::booking::{Booking, BookingSource, BookingStatus};
use rebook_core::domain::ids::{BookingId, LocationId, ServiceId, StaffId, SuggestionId, UserId};
use rebook_core::domain::slot::Slot;

use super::{
    decode_date, decode_datetime, decode_decimal, decode_id_list, decode_time, encode_id_list,
    BookingRepository, CommitOutcome, RepositoryError,
};
use crate::DbPool;

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, location_id, service_ids, staff_id, booking_date, \
                               booking_time, status, total_price, source, created_at";

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: Option<String> =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location_id: Option<String> =
        row.try_get("location_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_ids: String =
        row.try_get("service_ids").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let staff_id: Option<String> =
        row.try_get("staff_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let booking_date: String =
        row.try_get("booking_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let booking_time: String =
        row.try_get("booking_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_price: String =
        row.try_get("total_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let source: String =
        row.try_get("source").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Booking {
        id: BookingId(id),
        user_id: user_id.map(UserId),
        location_id: location_id.map(LocationId),
        service_ids: decode_id_list(&service_ids)?.into_iter().map(ServiceId).collect(),
        staff_id: staff_id.map(StaffId),
        date: decode_date(&booking_date)?,
        time: decode_time(&booking_time)?,
        status: BookingStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown booking status `{status}`")))?,
        total_price: decode_decimal(&total_price)?,
        source: BookingSource::parse(&source)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown booking source `{source}`")))?,
        created_at: decode_datetime(&created_at)?,
    })
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM booking WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_booking).transpose()
    }

    async fn insert(&self, booking: &Booking) -> Result<(), RepositoryError> {
        let service_ids =
            encode_id_list(&booking.service_ids.iter().map(|s| s.0.clone()).collect::<Vec<_>>());

        sqlx::query(
            "INSERT INTO booking
                (id, user_id, location_id, service_ids, staff_id, booking_date,
                 booking_time, status, total_price, source, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&booking.id.0)
        .bind(booking.user_id.as_ref().map(|id| id.0.as_str()))
        .bind(booking.location_id.as_ref().map(|id| id.0.as_str()))
        .bind(&service_ids)
        .bind(booking.staff_id.as_ref().map(|id| id.0.as_str()))
        .bind(booking.date.to_string())
        .bind(booking.time.to_string())
        .bind(booking.status.as_str())
        .bind(booking.total_price.to_string())
        .bind(booking.source.as_str())
        .bind(booking.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn completed_history(
        &self,
        user_id: &UserId,
        location_id: &LocationId,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM booking
             WHERE user_id = ? AND location_id = ? AND status = 'completed'
             ORDER BY booking_date DESC, booking_time DESC",
        ))
        .bind(&user_id.0)
        .bind(&location_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect()
    }

    async fn slot_taken(&self, slot: &Slot) -> Result<bool, RepositoryError> {
        let staff = slot.staff_id.as_ref().map(|id| id.0.as_str());

        // With a named staff member, an unassigned booking at the same time
        // still blocks; with no staff named, any booking blocks.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM booking
             WHERE location_id = ?1 AND booking_date = ?2 AND booking_time = ?3
               AND status IN ('pending', 'confirmed')
               AND (?4 IS NULL OR staff_id IS NULL OR staff_id = ?4)",
        )
        .bind(&slot.location_id.0)
        .bind(slot.date.to_string())
        .bind(slot.time.to_string())
        .bind(staff)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn occupying_on_dates(
        &self,
        pairs: &[(LocationId, NaiveDate)],
    ) -> Result<Vec<Booking>, RepositoryError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {BOOKING_COLUMNS} FROM booking \
             WHERE status IN ('pending', 'confirmed') AND ("
        ));
        for (index, (location_id, date)) in pairs.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder
                .push("(location_id = ")
                .push_bind(location_id.0.clone())
                .push(" AND booking_date = ")
                .push_bind(date.to_string())
                .push(")");
        }
        builder.push(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_booking).collect()
    }

    async fn commit_rebooking(
        &self,
        booking: &Booking,
        suggestion_id: &SuggestionId,
        responded_at: DateTime<Utc>,
    ) -> Result<CommitOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Claim the suggestion first: a concurrent commit that already won
        // leaves zero claimable rows, and we bail before touching the slot.
        let claimed = sqlx::query(
            "UPDATE suggestion
             SET status = 'accepted', responded_at = ?, resulting_booking_id = ?
             WHERE id = ? AND status IN ('pending', 'shown')",
        )
        .bind(responded_at.to_rfc3339())
        .bind(&booking.id.0)
        .bind(&suggestion_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            return Ok(CommitOutcome::SuggestionAlreadyClaimed);
        }

        // Authoritative availability check, inside the transaction and under
        // the caller-held slot lock. The advisory presentation-time check is
        // never trusted here.
        let staff = booking.staff_id.as_ref().map(|id| id.0.as_str());
        let location = booking
            .location_id
            .as_ref()
            .ok_or_else(|| RepositoryError::Decode("rebooking requires a location".to_string()))?;
        let conflicts: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM booking
             WHERE location_id = ?1 AND booking_date = ?2 AND booking_time = ?3
               AND status IN ('pending', 'confirmed')
               AND (?4 IS NULL OR staff_id IS NULL OR staff_id = ?4)",
        )
        .bind(&location.0)
        .bind(booking.date.to_string())
        .bind(booking.time.to_string())
        .bind(staff)
        .fetch_one(&mut *tx)
        .await?;

        if conflicts > 0 {
            // Dropping the transaction rolls the claim back.
            return Ok(CommitOutcome::SlotConflict);
        }

        let service_ids =
            encode_id_list(&booking.service_ids.iter().map(|s| s.0.clone()).collect::<Vec<_>>());
        sqlx::query(
            "INSERT INTO booking
                (id, user_id, location_id, service_ids, staff_id, booking_date,
                 booking_time, status, total_price, source, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&booking.id.0)
        .bind(booking.user_id.as_ref().map(|id| id.0.as_str()))
        .bind(location.0.as_str())
        .bind(&service_ids)
        .bind(staff)
        .bind(booking.date.to_string())
        .bind(booking.time.to_string())
        .bind(booking.status.as_str())
        .bind(booking.total_price.to_string())
        .bind(booking.source.as_str())
        .bind(booking.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CommitOutcome::Committed)
    }
}
