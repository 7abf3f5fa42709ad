//! Read-only for everyone, writable by admins.

use actix_web::{web, HttpResponse};
use pa_core::models::{Animal, Breed, Locality, Region};
use pa_core::validation::{validate_coordinates, validate_name};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::AppState;
use crate::error::ApiResult;
use crate::extract::RequireAdmin;

#[derive(Debug, Deserialize)]
pub struct ByAnimal {
    pub animal_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ByRegion {
    pub region_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NewNamed {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NewBreed {
    pub name: String,
    pub animal_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NewLocality {
    pub name: String,
    pub region_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveById {
    pub id: Uuid,
}

// Animals
pub async fn list_animals(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let animals = data.catalog.list_animals().await?;
    Ok(HttpResponse::Ok().json(json!({ "animals": animals })))
}

pub async fn get_animal(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let animal = data.catalog.get_animal(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "animal": animal })))
}

pub async fn add_animal(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<NewNamed>,
) -> ApiResult<HttpResponse> {
    validate_name(&body.name)?;
    let animal = Animal { id: Uuid::new_v4(), name: body.into_inner().name };
    data.catalog.add_animal(&animal).await?;
    log::info!("animal {} added as {}", animal.name, animal.id);
    Ok(HttpResponse::Ok().json(json!({ "animal": animal })))
}

pub async fn remove_animal(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<RemoveById>,
) -> ApiResult<HttpResponse> {
    data.catalog.remove_animal(body.id).await?;
    Ok(HttpResponse::Ok().finish())
}

// Breeds
pub async fn list_breeds(data: web::Data<AppState>, query: web::Query<ByAnimal>) -> ApiResult<HttpResponse> {
    let breeds = data.catalog.list_breeds(query.animal_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "breeds": breeds })))
}

pub async fn get_breed(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let breed = data.catalog.get_breed(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "breed": breed })))
}

pub async fn add_breed(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<NewBreed>,
) -> ApiResult<HttpResponse> {
    validate_name(&body.name)?;
    let body = body.into_inner();
    let breed = Breed { id: Uuid::new_v4(), animal_id: body.animal_id, name: body.name };
    data.catalog.add_breed(&breed).await?;
    Ok(HttpResponse::Ok().json(json!({ "breed": breed })))
}

pub async fn remove_breed(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<RemoveById>,
) -> ApiResult<HttpResponse> {
    data.catalog.remove_breed(body.id).await?;
    Ok(HttpResponse::Ok().finish())
}

// Regions
pub async fn list_regions(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let regions = data.catalog.list_regions().await?;
    Ok(HttpResponse::Ok().json(json!({ "regions": regions })))
}

pub async fn get_region(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let region = data.catalog.get_region(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "region": region })))
}

pub async fn add_region(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<NewNamed>,
) -> ApiResult<HttpResponse> {
    validate_name(&body.name)?;
    let region = Region { id: Uuid::new_v4(), name: body.into_inner().name };
    data.catalog.add_region(&region).await?;
    Ok(HttpResponse::Ok().json(json!({ "region": region })))
}

pub async fn remove_region(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<RemoveById>,
) -> ApiResult<HttpResponse> {
    data.catalog.remove_region(body.id).await?;
    Ok(HttpResponse::Ok().finish())
}

// Localities
pub async fn list_localities(data: web::Data<AppState>, query: web::Query<ByRegion>) -> ApiResult<HttpResponse> {
    let localities = data.catalog.list_localities(query.region_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "localities": localities })))
}

pub async fn get_locality(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let locality = data.catalog.get_locality(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "locality": locality })))
}

pub async fn add_locality(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<NewLocality>,
) -> ApiResult<HttpResponse> {
    validate_name(&body.name)?;
    validate_coordinates(body.latitude, body.longitude)?;
    let body = body.into_inner();
    let locality = Locality {
        id: Uuid::new_v4(),
        region_id: body.region_id,
        latitude: body.latitude,
        longitude: body.longitude,
        name: body.name,
    };
    data.catalog.add_locality(&locality).await?;
    Ok(HttpResponse::Ok().json(json!({ "locality": locality })))
}

pub async fn remove_locality(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    body: web::Json<RemoveById>,
) -> ApiResult<HttpResponse> {
    data.catalog.remove_locality(body.id).await?;
    Ok(HttpResponse::Ok().finish())
}
