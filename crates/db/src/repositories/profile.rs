use chrono::Weekday;
use sqlx::Row;

use rebook_core::domain::ids::{BookingId, LocationId, ServiceId, StaffId, UserId};
use rebook_core::domain::profile::{PreferenceProfile, TimeBucket};

use super::{
    decode_date, decode_datetime, decode_decimal, decode_id_list, decode_time, encode_id_list,
    ProfileRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PROFILE_COLUMNS: &str =
    "user_id, location_id, preferred_staff_id, preferred_service_ids, preferred_day_of_week, \
     preferred_time_bucket, preferred_time_exact, average_interval_days, last_booking_id, \
     last_booking_date, total_completed_bookings, total_spent, updated_at";

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<PreferenceProfile, RepositoryError> {
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location_id: String =
        row.try_get("location_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferred_staff_id: Option<String> =
        row.try_get("preferred_staff_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferred_service_ids: String = row
        .try_get("preferred_service_ids")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferred_day_of_week: Option<i64> = row
        .try_get("preferred_day_of_week")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferred_time_bucket: Option<String> = row
        .try_get("preferred_time_bucket")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferred_time_exact: Option<String> = row
        .try_get("preferred_time_exact")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let average_interval_days: Option<i64> = row
        .try_get("average_interval_days")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_booking_id: Option<String> =
        row.try_get("last_booking_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_booking_date: Option<String> =
        row.try_get("last_booking_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_completed_bookings: i64 = row
        .try_get("total_completed_bookings")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_spent: String =
        row.try_get("total_spent").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let preferred_day_of_week = preferred_day_of_week
        .map(|day| {
            u8::try_from(day)
                .ok()
                .and_then(|day| Weekday::try_from(day).ok())
                .ok_or_else(|| RepositoryError::Decode(format!("invalid weekday `{day}`")))
        })
        .transpose()?;

    let preferred_time_bucket = preferred_time_bucket
        .map(|bucket| {
            TimeBucket::parse(&bucket)
                .ok_or_else(|| RepositoryError::Decode(format!("invalid time bucket `{bucket}`")))
        })
        .transpose()?;

    Ok(PreferenceProfile {
        user_id: UserId(user_id),
        location_id: LocationId(location_id),
        preferred_staff_id: preferred_staff_id.map(StaffId),
        preferred_service_ids: decode_id_list(&preferred_service_ids)?
            .into_iter()
            .map(ServiceId)
            .collect(),
        preferred_day_of_week,
        preferred_time_bucket,
        preferred_time_exact: preferred_time_exact.as_deref().map(decode_time).transpose()?,
        average_interval_days,
        last_booking_id: last_booking_id.map(BookingId),
        last_booking_date: last_booking_date.as_deref().map(decode_date).transpose()?,
        total_completed_bookings: u32::try_from(total_completed_bookings).map_err(|_| {
            RepositoryError::Decode(format!("invalid completion count `{total_completed_bookings}`"))
        })?,
        total_spent: decode_decimal(&total_spent)?,
        updated_at: decode_datetime(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find(
        &self,
        user_id: &UserId,
        location_id: &LocationId,
    ) -> Result<Option<PreferenceProfile>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM preference_profile \
             WHERE user_id = ? AND location_id = ?"
        ))
        .bind(&user_id.0)
        .bind(&location_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PreferenceProfile>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM preference_profile
             WHERE user_id = ? AND last_booking_date IS NOT NULL
             ORDER BY last_booking_date DESC
             LIMIT ?",
        ))
        .bind(&user_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_profile).collect()
    }

    async fn list_sweep_candidates(
        &self,
        min_completed_bookings: u32,
    ) -> Result<Vec<PreferenceProfile>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM preference_profile
             WHERE total_completed_bookings >= ?
             ORDER BY user_id, location_id",
        ))
        .bind(min_completed_bookings)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_profile).collect()
    }

    async fn upsert(&self, profile: &PreferenceProfile) -> Result<(), RepositoryError> {
        let service_ids = encode_id_list(
            &profile.preferred_service_ids.iter().map(|s| s.0.clone()).collect::<Vec<_>>(),
        );

        sqlx::query(
            "INSERT INTO preference_profile
                (user_id, location_id, preferred_staff_id, preferred_service_ids,
                 preferred_day_of_week, preferred_time_bucket, preferred_time_exact,
                 average_interval_days, last_booking_id, last_booking_date,
                 total_completed_bookings, total_spent, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, location_id) DO UPDATE SET
                preferred_staff_id = excluded.preferred_staff_id,
                preferred_service_ids = excluded.preferred_service_ids,
                preferred_day_of_week = excluded.preferred_day_of_week,
                preferred_time_bucket = excluded.preferred_time_bucket,
                preferred_time_exact = excluded.preferred_time_exact,
                average_interval_days = excluded.average_interval_days,
                last_booking_id = excluded.last_booking_id,
                last_booking_date = excluded.last_booking_date,
                total_completed_bookings = excluded.total_completed_bookings,
                total_spent = excluded.total_spent,
                updated_at = excluded.updated_at",
        )
        .bind(&profile.user_id.0)
        .bind(&profile.location_id.0)
        .bind(profile.preferred_staff_id.as_ref().map(|id| id.0.as_str()))
        .bind(&service_ids)
        .bind(profile.preferred_day_of_week.map(|day| day.num_days_from_monday() as i64))
        .bind(profile.preferred_time_bucket.map(|bucket| bucket.as_str()))
        .bind(profile.preferred_time_exact.map(|time| time.to_string()))
        .bind(profile.average_interval_days)
        .bind(profile.last_booking_id.as_ref().map(|id| id.0.as_str()))
        .bind(profile.last_booking_date.map(|date| date.to_string()))
        .bind(i64::from(profile.total_completed_bookings))
        .bind(profile.total_spent.to_string())
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
