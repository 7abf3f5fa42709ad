//! Reference data: animals, breeds, regions and localities.

use async_trait::async_trait;
use pa_core::error::{AppError, Result};
use pa_core::models::{Animal, Breed, Locality, Region};
use pa_core::ranking::UnitVector;
use pa_core::traits::CatalogRepo;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use crate::{ensure_affected, get_uuid, map_sqlx_error, uuid_to_blob, SqliteRepo};

fn animal_from_row(row: &SqliteRow) -> std::result::Result<Animal, sqlx::Error> {
    Ok(Animal { id: get_uuid(row, "id")?, name: row.try_get("name")? })
}

fn breed_from_row(row: &SqliteRow) -> std::result::Result<Breed, sqlx::Error> {
    Ok(Breed {
        id: get_uuid(row, "id")?,
        animal_id: get_uuid(row, "animal_id")?,
        name: row.try_get("name")?,
    })
}

fn region_from_row(row: &SqliteRow) -> std::result::Result<Region, sqlx::Error> {
    Ok(Region { id: get_uuid(row, "id")?, name: row.try_get("name")? })
}

fn locality_from_row(row: &SqliteRow) -> std::result::Result<Locality, sqlx::Error> {
    Ok(Locality {
        id: get_uuid(row, "id")?,
        region_id: get_uuid(row, "region_id")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        name: row.try_get("name")?,
    })
}

impl SqliteRepo {
    async fn fetch_list<T>(
        &self,
        mut qb: QueryBuilder<'_, Sqlite>,
        map: fn(&SqliteRow) -> std::result::Result<T, sqlx::Error>,
    ) -> Result<Vec<T>> {
        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter()
            .map(map)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn fetch_by_id<T>(
        &self,
        sql: &str,
        entity: &str,
        id: Uuid,
        map: fn(&SqliteRow) -> std::result::Result<T, sqlx::Error>,
    ) -> Result<T> {
        let row = sqlx::query(sql)
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::not_found(entity, id))?;
        map(&row).map_err(map_sqlx_error)
    }

    /// Deletes by primary key; rows still referenced elsewhere yield `InvalidReference`.
    async fn remove_by_id(&self, sql: &str, entity: &str, id: Uuid) -> Result<()> {
        let done = sqlx::query(sql)
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .map_err(|e| match map_sqlx_error(e) {
                AppError::InvalidReference(_) => {
                    AppError::InvalidReference(format!("{entity} {id} is still in use"))
                }
                other => other,
            })?;
        ensure_affected(done.rows_affected(), entity, id)
    }
}

#[async_trait]
impl CatalogRepo for SqliteRepo {
    // Animal Operations
    async fn list_animals(&self) -> Result<Vec<Animal>> {
        let qb = QueryBuilder::new("SELECT id, name FROM animals ORDER BY name");
        self.fetch_list(qb, animal_from_row).await
    }

    async fn get_animal(&self, id: Uuid) -> Result<Animal> {
        self.fetch_by_id("SELECT id, name FROM animals WHERE id = ?", "Animal", id, animal_from_row)
            .await
    }

    async fn add_animal(&self, animal: &Animal) -> Result<()> {
        sqlx::query("INSERT INTO animals (id, name) VALUES (?, ?)")
            .bind(uuid_to_blob(animal.id))
            .bind(&animal.name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_animal(&self, id: Uuid) -> Result<()> {
        self.remove_by_id("DELETE FROM animals WHERE id = ?", "Animal", id).await
    }

    // Breed Operations
    async fn list_breeds(&self, animal_id: Option<Uuid>) -> Result<Vec<Breed>> {
        let mut qb = QueryBuilder::new("SELECT id, animal_id, name FROM breeds");
        if let Some(animal_id) = animal_id {
            qb.push(" WHERE animal_id = ");
            qb.push_bind(uuid_to_blob(animal_id));
        }
        qb.push(" ORDER BY name");
        self.fetch_list(qb, breed_from_row).await
    }

    async fn get_breed(&self, id: Uuid) -> Result<Breed> {
        self.fetch_by_id("SELECT id, animal_id, name FROM breeds WHERE id = ?", "Breed", id, breed_from_row)
            .await
    }

    async fn add_breed(&self, breed: &Breed) -> Result<()> {
        sqlx::query("INSERT INTO breeds (id, animal_id, name) VALUES (?, ?, ?)")
            .bind(uuid_to_blob(breed.id))
            .bind(uuid_to_blob(breed.animal_id))
            .bind(&breed.name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_breed(&self, id: Uuid) -> Result<()> {
        self.remove_by_id("DELETE FROM breeds WHERE id = ?", "Breed", id).await
    }

    // Region Operations
    async fn list_regions(&self) -> Result<Vec<Region>> {
        let qb = QueryBuilder::new("SELECT id, name FROM regions ORDER BY name");
        self.fetch_list(qb, region_from_row).await
    }

    async fn get_region(&self, id: Uuid) -> Result<Region> {
        self.fetch_by_id("SELECT id, name FROM regions WHERE id = ?", "Region", id, region_from_row)
            .await
    }

    async fn add_region(&self, region: &Region) -> Result<()> {
        sqlx::query("INSERT INTO regions (id, name) VALUES (?, ?)")
            .bind(uuid_to_blob(region.id))
            .bind(&region.name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_region(&self, id: Uuid) -> Result<()> {
        self.remove_by_id("DELETE FROM regions WHERE id = ?", "Region", id).await
    }

    // Locality Operations
    async fn list_localities(&self, region_id: Option<Uuid>) -> Result<Vec<Locality>> {
        let mut qb = QueryBuilder::new("SELECT id, region_id, name, latitude, longitude FROM localities");
        if let Some(region_id) = region_id {
            qb.push(" WHERE region_id = ");
            qb.push_bind(uuid_to_blob(region_id));
        }
        qb.push(" ORDER BY name");
        self.fetch_list(qb, locality_from_row).await
    }

    async fn get_locality(&self, id: Uuid) -> Result<Locality> {
        self.fetch_by_id(
            "SELECT id, region_id, name, latitude, longitude FROM localities WHERE id = ?",
            "Locality",
            id,
            locality_from_row,
        )
        .await
    }

    async fn add_locality(&self, locality: &Locality) -> Result<()> {
        let unit = UnitVector::from(locality.point());
        sqlx::query(
            "INSERT INTO localities (id, region_id, name, latitude, longitude, unit_x, unit_y, unit_z) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(locality.id))
        .bind(uuid_to_blob(locality.region_id))
        .bind(&locality.name)
        .bind(locality.latitude)
        .bind(locality.longitude)
        .bind(unit.x)
        .bind(unit.y)
        .bind(unit.z)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_locality(&self, id: Uuid) -> Result<()> {
        self.remove_by_id("DELETE FROM localities WHERE id = ?", "Locality", id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::world;

    #[tokio::test]
    async fn test_animals_listed_by_name() {
        let w = world().await;
        let names: Vec<String> = w.repo.list_animals().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["cat", "dog"]);
        assert_eq!(w.repo.get_animal(w.dog).await.unwrap().name, "dog");
        assert!(w.repo.get_animal(Uuid::new_v4()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_breeds_filtered_by_animal() {
        let w = world().await;
        let cats = w.repo.list_breeds(Some(w.cat)).await.unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].id, w.siamese);
        assert_eq!(w.repo.list_breeds(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_breed_of_unknown_animal_is_invalid_reference() {
        let w = world().await;
        let orphan = Breed { id: Uuid::new_v4(), animal_id: Uuid::new_v4(), name: "ghost".into() };
        let err = w.repo.add_breed(&orphan).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_remove_referenced_and_missing_rows() {
        let w = world().await;
        let err = w.repo.remove_animal(w.cat).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidReference(_)));

        w.repo.remove_breed(w.siamese).await.unwrap();
        w.repo.remove_animal(w.cat).await.unwrap();
        assert!(w.repo.remove_animal(w.cat).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_localities_by_region() {
        let w = world().await;
        let other = Region { id: Uuid::new_v4(), name: "Volga".into() };
        w.repo.add_region(&other).await.unwrap();
        let moscow = w.locality("Moscow", (55.75, 37.61)).await;
        let kazan = Locality { id: Uuid::new_v4(), region_id: other.id, name: "Kazan".into(), latitude: 55.79, longitude: 49.1 };
        w.repo.add_locality(&kazan).await.unwrap();

        let central = w.repo.list_localities(Some(w.region)).await.unwrap();
        assert_eq!(central.iter().map(|l| l.id).collect::<Vec<_>>(), vec![moscow]);
        assert_eq!(w.repo.get_locality(kazan.id).await.unwrap(), kazan);
        assert_eq!(w.repo.list_regions().await.unwrap().len(), 2);
        assert_eq!(w.repo.get_region(other.id).await.unwrap().name, "Volga");
    }

    #[tokio::test]
    async fn test_locality_stores_its_unit_vector() {
        let w = world().await;
        let north_pole = Locality {
            id: Uuid::new_v4(),
            region_id: w.region,
            name: "Pole".into(),
            latitude: 90.0,
            longitude: 0.0,
        };
        w.repo.add_locality(&north_pole).await.unwrap();

        let row = sqlx::query("SELECT unit_x, unit_y, unit_z FROM localities WHERE id = ?")
            .bind(uuid_to_blob(north_pole.id))
            .fetch_one(w.repo.pool())
            .await
            .unwrap();
        let z: f64 = row.get("unit_z");
        let xy = row.get::<f64, _>("unit_x").abs() + row.get::<f64, _>("unit_y").abs();
        assert!((z - 1.0).abs() < 1e-12);
        assert!(xy < 1e-12);
        assert_eq!(UnitVector::from(north_pole.point()).z, z);
    }

    #[tokio::test]
    async fn test_duplicate_animal_is_conflict() {
        let w = world().await;
        let twin = Animal { id: Uuid::new_v4(), name: "cat".into() };
        assert!(matches!(w.repo.add_animal(&twin).await.unwrap_err(), AppError::Conflict(_)));
    }
}
