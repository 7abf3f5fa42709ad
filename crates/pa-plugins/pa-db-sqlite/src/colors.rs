use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pa_core::colors::Color;
use pa_core::error::Result;
use pa_core::models::AdStatus;
use pa_core::traits::ColorRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{get_uuid, map_sqlx_error, uuid_to_blob, SqliteRepo};

fn color_from_row(row: &SqliteRow) -> std::result::Result<Color, sqlx::Error> {
    let channel = |column: &str| -> std::result::Result<u8, sqlx::Error> {
        let value: i64 = row.try_get(column)?;
        u8::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    };
    Ok(Color::new(channel("red")?, channel("green")?, channel("blue")?))
}

#[async_trait]
impl ColorRepo for SqliteRepo {
    async fn get_color(&self, ad_id: Uuid) -> Result<Option<Color>> {
        let row = sqlx::query("SELECT red, green, blue FROM ad_colors WHERE ad_id = ?")
            .bind(uuid_to_blob(ad_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref()
            .map(color_from_row)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn set_color(&self, ad_id: Uuid, color: Color, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO ad_colors (ad_id, red, green, blue, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (ad_id) DO UPDATE SET \
                red = excluded.red, \
                green = excluded.green, \
                blue = excluded.blue, \
                updated_at = excluded.updated_at",
        )
        .bind(uuid_to_blob(ad_id))
        .bind(i64::from(color.r))
        .bind(i64::from(color.g))
        .bind(i64::from(color.b))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_color(&self, ad_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM ad_colors WHERE ad_id = ?")
            .bind(uuid_to_blob(ad_id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn active_colors(&self) -> Result<Vec<(Uuid, Color)>> {
        let rows = sqlx::query(
            "SELECT c.ad_id, c.red, c.green, c.blue FROM ad_colors c \
             INNER JOIN ads a ON a.id = c.ad_id WHERE a.status = ?",
        )
        .bind(AdStatus::Actual.as_code())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| Ok((get_uuid(row, "ad_id")?, color_from_row(row)?)))
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::world;
    use pa_core::error::AppError;
    use pa_core::models::AdUpdate;
    use pa_core::traits::AdRepo;

    const BLACK: Color = Color::new(10, 10, 12);
    const WHITE: Color = Color::new(240, 240, 235);

    #[tokio::test]
    async fn test_color_absent_then_set_then_replaced() {
        let w = world().await;
        let owner = w.user("owner", None).await;
        let ad = w.insert(w.ad(owner, w.cat, w.siamese, 1, Utc::now())).await;

        assert_eq!(w.repo.get_color(ad).await.unwrap(), None);
        w.repo.set_color(ad, BLACK, Utc::now()).await.unwrap();
        assert_eq!(w.repo.get_color(ad).await.unwrap(), Some(BLACK));
        w.repo.set_color(ad, WHITE, Utc::now()).await.unwrap();
        assert_eq!(w.repo.get_color(ad).await.unwrap(), Some(WHITE));

        w.repo.remove_color(ad).await.unwrap();
        w.repo.remove_color(ad).await.unwrap();
        assert_eq!(w.repo.get_color(ad).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_color_for_unknown_ad_is_invalid_reference() {
        let w = world().await;
        let err = w.repo.set_color(Uuid::new_v4(), BLACK, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_active_colors_skip_closed_and_deleted_ads() {
        let w = world().await;
        let owner = w.user("owner", None).await;
        let open = w.insert(w.ad(owner, w.cat, w.siamese, 1, Utc::now())).await;
        let closed = w.insert(w.ad(owner, w.cat, w.siamese, 1, Utc::now())).await;
        let deleted = w.insert(w.ad(owner, w.dog, w.husky, 1, Utc::now())).await;
        for ad in [open, closed, deleted] {
            w.repo.set_color(ad, BLACK, Utc::now()).await.unwrap();
        }

        let realised = AdUpdate { status: Some(AdStatus::Realised), ..Default::default() };
        w.repo.update_ad(closed, &realised, Utc::now()).await.unwrap();
        w.repo.delete_ad(deleted).await.unwrap();

        assert_eq!(w.repo.active_colors().await.unwrap(), vec![(open, BLACK)]);
        assert_eq!(w.repo.get_color(deleted).await.unwrap(), None);
    }
}
