//! # pa-db-sqlite Implementation
//!
//! This crate implements the data mapping between the SQLite relational model
//! and the `pa-core` domain models. A single [`SqliteRepo`] serves every
//! persistence port: ads, colour tags, search history, users, the catalog and the
//! user locator.

mod ads;
mod catalog;
mod colors;
mod history;
mod users;

use std::str::FromStr;

use pa_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Opens (creating if missing) the database at `url` and applies pending migrations.
    pub async fn new(url: &str) -> Result<Self> {
        Self::connect(url, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory URL opens its own empty database,
        // so the pool must hold exactly one and never recycle it.
        let pool_options = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(AppError::internal)?;

        log::info!("SQLite database ready at {url}");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Maps driver failures onto the core error kinds.
pub fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::RowNotFound => AppError::NotFound("Row".into(), "unknown".into()),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::InvalidReference(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(db.message().to_string())
        }
        other => {
            log::error!("database error: {other}");
            AppError::internal(other)
        }
    }
}

// Helpers for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> std::result::Result<Uuid, sqlx::Error> {
    Uuid::from_slice(blob).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn get_uuid(row: &SqliteRow, column: &str) -> std::result::Result<Uuid, sqlx::Error> {
    let blob: Vec<u8> = row.try_get(column)?;
    blob_to_uuid(&blob)
}

fn get_opt_uuid(row: &SqliteRow, column: &str) -> std::result::Result<Option<Uuid>, sqlx::Error> {
    let blob: Option<Vec<u8>> = row.try_get(column)?;
    blob.as_deref().map(blob_to_uuid).transpose()
}

/// Rows touched by a keyed UPDATE/DELETE; zero means the key did not exist.
fn ensure_affected(affected: u64, entity: &str, id: Uuid) -> Result<()> {
    if affected == 0 {
        return Err(AppError::not_found(entity, id));
    }
    Ok(())
}
