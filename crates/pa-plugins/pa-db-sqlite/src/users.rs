use async_trait::async_trait;
use pa_core::error::{AppError, Result};
use pa_core::models::User;
use pa_core::traits::UserRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{ensure_affected, get_opt_uuid, get_uuid, map_sqlx_error, uuid_to_blob, SqliteRepo};

const USER_COLUMNS: &str = "SELECT id, username, password_hash, locality_id, created_at FROM users";

fn user_from_row(row: &SqliteRow) -> std::result::Result<User, sqlx::Error> {
    Ok(User {
        id: get_uuid(row, "id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        locality_id: get_opt_uuid(row, "locality_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UserRepo for SqliteRepo {
    async fn get_user_by_id(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query(&format!("{USER_COLUMNS} WHERE id = ?"))
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::not_found("User", id))?;
        user_from_row(&row).map_err(map_sqlx_error)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User> {
        let row = sqlx::query(&format!("{USER_COLUMNS} WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::not_found("User", username))?;
        user_from_row(&row).map_err(map_sqlx_error)
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, locality_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(user.id))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.locality_id.map(uuid_to_blob))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("username {} is taken", user.username)),
            other => other,
        })?;
        Ok(())
    }

    async fn set_locality(&self, user_id: Uuid, locality_id: Uuid) -> Result<()> {
        let done = sqlx::query("UPDATE users SET locality_id = ? WHERE id = ?")
            .bind(uuid_to_blob(locality_id))
            .bind(uuid_to_blob(user_id))
            .execute(&self.pool)
            .await
            .map_err(|e| match map_sqlx_error(e) {
                AppError::InvalidReference(_) => {
                    AppError::InvalidReference(format!("locality {locality_id} does not exist"))
                }
                other => other,
            })?;
        ensure_affected(done.rows_affected(), "User", user_id)
    }
}
