use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use pa_core::error::AppError;
use pa_core::models::{AdForm, AdPatch, CloseStatus, PhotoUpload, SearchFilter};
use pa_core::traits::DescriptionService;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{photo_upload, read_upload, AppState};
use crate::error::{ApiError, ApiResult};
use crate::extract::{MaybeAuth, RequireAdmin, RequireAuth};
use crate::params::{empty_as_none, flag};

/// Query string of `GET /ads`. Empty values count as absent; anything else that
/// fails to parse is a 400.
#[derive(Debug, Default, Deserialize)]
pub struct AdsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub owner_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub animal_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub breed_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub min_price: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub max_price: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub radius: Option<u32>,
    #[serde(default, deserialize_with = "flag")]
    pub all_statuses: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<u32>,
}

impl AdsQuery {
    fn into_filter(self, state: &AppState) -> SearchFilter {
        let defaults = state.limits.filter();
        SearchFilter {
            owner_id: self.owner_id,
            animal_id: self.animal_id,
            breed_id: self.breed_id,
            min_price: self.min_price,
            max_price: self.max_price,
            radius: self.radius,
            all_statuses: self.all_statuses.unwrap_or(false),
            limit: state.limits.cap(self.limit.unwrap_or(defaults.limit)),
            offset: self.offset.unwrap_or(defaults.offset),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub status: CloseStatus,
}

/// Hands the photo to the description service without holding up the response.
fn describe_in_background(describer: Arc<dyn DescriptionService>, ad_id: Uuid, photo: PhotoUpload) {
    actix_web::rt::spawn(async move {
        if let Err(err) = describer.describe(ad_id, &photo).await {
            log::warn!("photo description for ad {ad_id} failed: {err}");
        }
    });
}

pub async fn search_ads(
    data: web::Data<AppState>,
    requester: MaybeAuth,
    query: web::Query<AdsQuery>,
) -> ApiResult<HttpResponse> {
    let filter = query.into_inner().into_filter(&data);
    let ads = data.search.search_ads(requester.0, filter).await?;
    Ok(HttpResponse::Ok().json(json!({ "ads": ads })))
}

pub async fn get_ad(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let ad = data.ads.get_ad(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ad": ad })))
}

/// Actual ads whose photo shows an animal of a similar colour; 404 until the ad's
/// own photo has been described.
pub async fn same_ads(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let ads = data.similar.same_ads(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ads": ads })))
}

/// Multipart body: `ad` (JSON) and `photo` (image file).
pub async fn create_ad(
    data: web::Data<AppState>,
    user: RequireAuth,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let upload = read_upload(payload, data.max_photo_bytes).await?;
    let form: AdForm = match upload.ad {
        Some(raw) => serde_json::from_slice(&raw)
            .map_err(|e| ApiError(AppError::ValidationError(format!("bad ad field: {e}"))))?,
        None => return Err(ApiError(AppError::ValidationError("ad is required".into()))),
    };
    let photo = photo_upload(data.photos.as_ref(), upload.photo)?;

    let ad = data.ads.create_ad(user.0, form, &photo).await?;
    describe_in_background(Arc::clone(&data.describer), ad.info.id, photo);
    Ok(HttpResponse::Ok().json(json!({ "ad": ad })))
}

pub async fn update_ad(
    data: web::Data<AppState>,
    user: RequireAuth,
    path: web::Path<Uuid>,
    patch: web::Json<AdPatch>,
) -> ApiResult<HttpResponse> {
    let ad = data.ads.update_ad(user.0, path.into_inner(), patch.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ad": ad })))
}

pub async fn update_photo(
    data: web::Data<AppState>,
    user: RequireAuth,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let upload = read_upload(payload, data.max_photo_bytes).await?;
    let photo = photo_upload(data.photos.as_ref(), upload.photo)?;

    let ad = data.ads.update_photo(user.0, id, &photo).await?;
    describe_in_background(Arc::clone(&data.describer), id, photo);
    Ok(HttpResponse::Ok().json(json!({ "ad": ad })))
}

pub async fn close_ad(
    data: web::Data<AppState>,
    user: RequireAuth,
    path: web::Path<Uuid>,
    body: web::Json<CloseRequest>,
) -> ApiResult<HttpResponse> {
    let ad = data.ads.close(user.0, path.into_inner(), body.status).await?;
    Ok(HttpResponse::Ok().json(json!({ "ad": ad })))
}

pub async fn delete_ad(
    data: web::Data<AppState>,
    _admin: RequireAdmin,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    data.ads.delete_ad(id).await?;

    let describer = Arc::clone(&data.describer);
    actix_web::rt::spawn(async move {
        if let Err(err) = describer.forget(id).await {
            log::warn!("failed to drop description of ad {id}: {err}");
        }
    });
    Ok(HttpResponse::Ok().finish())
}
