use async_trait::async_trait;
use pa_core::error::{AppError, Result};
use pa_core::models::{GeoPoint, SearchHistory};
use pa_core::traits::{SearchHistoryRepo, UserLocator};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{get_opt_uuid, get_uuid, map_sqlx_error, uuid_to_blob, SqliteRepo};

fn history_from_row(row: &SqliteRow) -> std::result::Result<SearchHistory, sqlx::Error> {
    let radius: Option<i64> = row.try_get("radius")?;
    Ok(SearchHistory {
        user_id: get_uuid(row, "user_id")?,
        animal_id: get_opt_uuid(row, "animal_id")?,
        breed_id: get_opt_uuid(row, "breed_id")?,
        min_price: row.try_get("min_price")?,
        max_price: row.try_get("max_price")?,
        radius: radius.and_then(|r| u32::try_from(r).ok()),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl SearchHistoryRepo for SqliteRepo {
    async fn get_history(&self, user_id: Uuid) -> Result<Option<SearchHistory>> {
        let row = sqlx::query(
            "SELECT user_id, animal_id, breed_id, min_price, max_price, radius, created_at \
             FROM search_history WHERE user_id = ?",
        )
        .bind(uuid_to_blob(user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(history_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    /// Single-statement upsert: the previous record is replaced column by column,
    /// so absent dimensions are cleared rather than inherited.
    async fn upsert_history(&self, history: &SearchHistory) -> Result<()> {
        sqlx::query(
            "INSERT INTO search_history (user_id, animal_id, breed_id, min_price, max_price, radius, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET \
                animal_id = excluded.animal_id, \
                breed_id = excluded.breed_id, \
                min_price = excluded.min_price, \
                max_price = excluded.max_price, \
                radius = excluded.radius, \
                created_at = excluded.created_at",
        )
        .bind(uuid_to_blob(history.user_id))
        .bind(history.animal_id.map(uuid_to_blob))
        .bind(history.breed_id.map(uuid_to_blob))
        .bind(history.min_price)
        .bind(history.max_price)
        .bind(history.radius.map(i64::from))
        .bind(history.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl UserLocator for SqliteRepo {
    async fn locate_user(&self, user_id: Uuid) -> Result<Option<GeoPoint>> {
        let row = sqlx::query(
            "SELECT l.latitude, l.longitude FROM users u \
             LEFT JOIN localities l ON l.id = u.locality_id WHERE u.id = ?",
        )
        .bind(uuid_to_blob(user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| AppError::not_found("User", user_id))?;

        let latitude: Option<f64> = row.try_get("latitude").map_err(map_sqlx_error)?;
        let longitude: Option<f64> = row.try_get("longitude").map_err(map_sqlx_error)?;
        Ok(latitude
            .zip(longitude)
            .map(|(latitude, longitude)| GeoPoint { latitude, longitude }))
    }
}
