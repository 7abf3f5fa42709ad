use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pa_core::error::{AppError, Result};
use pa_core::models::{Ad, AdInfo, AdStatus, AdUpdate, RespAd, SearchFilter};
use pa_core::ranking::{Disc, RankPlan, RankingContext, ScoreTerm};
use pa_core::traits::AdRepo;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use crate::{ensure_affected, get_uuid, map_sqlx_error, uuid_to_blob, SqliteRepo};

/// Ad joined with its display names and the owner's locality.
const AD_PROJECTION: &str = "SELECT a.id, a.owner_id, a.status, a.photo_url, a.title, \
    a.description, a.animal_id, a.breed_id, a.price, a.contacts, a.created_at, a.updated_at, \
    u.username, an.name AS animal_name, b.name AS breed_name, l.name AS locality_name \
    FROM ads a \
    INNER JOIN users u ON u.id = a.owner_id \
    INNER JOIN animals an ON an.id = a.animal_id \
    INNER JOIN breeds b ON b.id = a.breed_id \
    LEFT JOIN localities l ON l.id = u.locality_id";

pub(crate) fn ad_from_row(row: &SqliteRow) -> std::result::Result<RespAd, sqlx::Error> {
    let code: String = row.try_get("status")?;
    let status = AdStatus::from_code(&code)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown ad status {code:?}").into()))?;

    Ok(RespAd {
        info: Ad {
            id: get_uuid(row, "id")?,
            owner_id: get_uuid(row, "owner_id")?,
            status,
            photo_url: row.try_get("photo_url")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            animal_id: get_uuid(row, "animal_id")?,
            breed_id: get_uuid(row, "breed_id")?,
            price: row.try_get("price")?,
            contacts: row.try_get("contacts")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        },
        extra_info: AdInfo {
            username: row.try_get("username")?,
            animal_name: row.try_get("animal_name")?,
            breed_name: row.try_get("breed_name")?,
            locality_name: row.try_get("locality_name")?,
        },
    })
}

/// Status, owner, animal, breed and price constraints.
fn apply_hard_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SearchFilter) {
    qb.push(" WHERE 1=1");

    if !filter.all_statuses {
        qb.push(" AND a.status = ");
        qb.push_bind(AdStatus::Actual.as_code());
    }
    if let Some(owner_id) = filter.owner_id {
        qb.push(" AND a.owner_id = ");
        qb.push_bind(uuid_to_blob(owner_id));
    }
    if let Some(animal_id) = filter.animal_id {
        qb.push(" AND a.animal_id = ");
        qb.push_bind(uuid_to_blob(animal_id));
    }
    if let Some(breed_id) = filter.breed_id {
        qb.push(" AND a.breed_id = ");
        qb.push_bind(uuid_to_blob(breed_id));
    }

    match (filter.min_price, filter.max_price) {
        (Some(min), Some(max)) => {
            qb.push(" AND a.price BETWEEN ");
            qb.push_bind(min);
            qb.push(" AND ");
            qb.push_bind(max);
        }
        (Some(min), None) => {
            qb.push(" AND a.price >= ");
            qb.push_bind(min);
        }
        (None, Some(max)) => {
            qb.push(" AND a.price <= ");
            qb.push_bind(max);
        }
        (None, None) => {}
    }
}

/// True for rows inside `disc` or without a known locality.
///
/// Squared chord between the locality's unit vector and the disc center.
fn push_within(qb: &mut QueryBuilder<'_, Sqlite>, disc: &Disc) {
    let c = disc.center;
    qb.push("(l.id IS NULL OR (");
    for (i, (column, value)) in [("l.unit_x", c.x), ("l.unit_y", c.y), ("l.unit_z", c.z)].into_iter().enumerate() {
        if i > 0 {
            qb.push(" + ");
        }
        qb.push(format!("({column} - "));
        qb.push_bind(value);
        qb.push(format!(") * ({column} - "));
        qb.push_bind(value);
        qb.push(")");
    }
    qb.push(") <= ");
    qb.push_bind(disc.max_chord_sq);
    qb.push(")");
}

/// `ORDER BY` with the history score first when the plan has one.
fn push_ordering(qb: &mut QueryBuilder<'_, Sqlite>, plan: &RankPlan) {
    qb.push(" ORDER BY ");
    if plan.is_personalized() {
        qb.push("(");
        qb.push_bind(plan.base_score());
        for term in &plan.score {
            qb.push(" + CASE WHEN ");
            match term {
                ScoreTerm::Animal(id) => {
                    qb.push("a.animal_id = ");
                    qb.push_bind(uuid_to_blob(*id));
                }
                ScoreTerm::Breed(id) => {
                    qb.push("a.breed_id = ");
                    qb.push_bind(uuid_to_blob(*id));
                }
                ScoreTerm::MinPrice(min) => {
                    qb.push("a.price >= ");
                    qb.push_bind(*min);
                }
                ScoreTerm::MaxPrice(max) => {
                    qb.push("a.price <= ");
                    qb.push_bind(*max);
                }
                ScoreTerm::Near(disc) => push_within(qb, disc),
            }
            qb.push(" THEN 1 ELSE 0 END");
        }
        qb.push(") DESC, ");
    }
    qb.push("a.updated_at DESC, a.id DESC");
}

#[async_trait]
impl AdRepo for SqliteRepo {
    async fn search_ads(&self, filter: &SearchFilter, ranking: &RankingContext) -> Result<Vec<RespAd>> {
        let plan = ranking.plan(filter);

        let mut qb = QueryBuilder::new(AD_PROJECTION);
        apply_hard_filters(&mut qb, filter);
        if let Some(disc) = &plan.within {
            qb.push(" AND ");
            push_within(&mut qb, disc);
        }
        push_ordering(&mut qb, &plan);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(filter.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(filter.offset));

        if plan.is_personalized() {
            log::debug!("search ordered by {} history terms", plan.score.len());
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter()
            .map(ad_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn get_ad(&self, id: Uuid) -> Result<RespAd> {
        let row = sqlx::query(&format!("{AD_PROJECTION} WHERE a.id = ?"))
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::not_found("Ad", id))?;

        ad_from_row(&row).map_err(map_sqlx_error)
    }

    async fn get_ads(&self, ids: &[Uuid]) -> Result<Vec<RespAd>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new(AD_PROJECTION);
        qb.push(" WHERE a.id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(uuid_to_blob(*id));
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter()
            .map(ad_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn create_ad(&self, ad: &Ad) -> Result<()> {
        sqlx::query(
            "INSERT INTO ads (id, owner_id, status, photo_url, title, description, animal_id, breed_id, price, contacts, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(ad.id))
        .bind(uuid_to_blob(ad.owner_id))
        .bind(ad.status.as_code())
        .bind(&ad.photo_url)
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(uuid_to_blob(ad.animal_id))
        .bind(uuid_to_blob(ad.breed_id))
        .bind(ad.price)
        .bind(&ad.contacts)
        .bind(ad.created_at)
        .bind(ad.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Only the columns present in `update` are written.
    async fn update_ad(&self, id: Uuid, update: &AdUpdate, now: DateTime<Utc>) -> Result<()> {
        let patch = &update.patch;
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE ads SET updated_at = ");
        qb.push_bind(now);

        if let Some(title) = &patch.title {
            qb.push(", title = ");
            qb.push_bind(title.clone());
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ");
            qb.push_bind(description.clone());
        }
        if let Some(animal_id) = patch.animal_id {
            qb.push(", animal_id = ");
            qb.push_bind(uuid_to_blob(animal_id));
        }
        if let Some(breed_id) = patch.breed_id {
            qb.push(", breed_id = ");
            qb.push_bind(uuid_to_blob(breed_id));
        }
        if let Some(price) = patch.price {
            qb.push(", price = ");
            qb.push_bind(price);
        }
        if let Some(contacts) = &patch.contacts {
            qb.push(", contacts = ");
            qb.push_bind(contacts.clone());
        }
        if let Some(photo_url) = &update.photo_url {
            qb.push(", photo_url = ");
            qb.push_bind(photo_url.clone());
        }
        if let Some(status) = update.status {
            qb.push(", status = ");
            qb.push_bind(status.as_code());
        }

        qb.push(" WHERE id = ");
        qb.push_bind(uuid_to_blob(id));

        let done = qb.build().execute(&self.pool).await.map_err(map_sqlx_error)?;
        ensure_affected(done.rows_affected(), "Ad", id)
    }

    async fn delete_ad(&self, id: Uuid) -> Result<()> {
        let done = sqlx::query("DELETE FROM ads WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        ensure_affected(done.rows_affected(), "Ad", id)
    }
}
