//! # pa-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core services.

pub mod ads;
pub mod catalog;
pub mod users;

use std::sync::Arc;

use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;
use pa_core::error::AppError;
use pa_core::models::PhotoUpload;
use pa_core::traits::{AuthProvider, CatalogRepo, DescriptionService, PhotoStore};
use pa_core::{AdService, SearchLimits, SearchOrchestrator, SimilarityService, UserService};

use crate::error::{ApiError, ApiResult};

/// State shared across all Actix-web workers.
pub struct AppState {
    pub search: Arc<SearchOrchestrator>,
    pub ads: AdService,
    pub similar: SimilarityService,
    pub users: UserService,
    pub catalog: Arc<dyn CatalogRepo>,
    pub photos: Arc<dyn PhotoStore>,
    pub describer: Arc<dyn DescriptionService>,
    pub auth: Arc<dyn AuthProvider>,
    pub limits: SearchLimits,
    /// Upper bound for an uploaded photo, in bytes
    pub max_photo_bytes: usize,
}

/// Raw parts of an ad upload form.
#[derive(Default)]
pub(crate) struct UploadForm {
    pub ad: Option<Vec<u8>>,
    pub photo: Option<Vec<u8>>,
}

fn multipart_error(err: impl std::fmt::Display) -> ApiError {
    ApiError(AppError::ValidationError(format!("malformed multipart body: {err}")))
}

async fn read_field(field: &mut Field, limit: usize, name: &str) -> ApiResult<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        if data.len() + chunk.len() > limit {
            return Err(ApiError(AppError::ValidationError(format!(
                "{name} exceeds {limit} bytes"
            ))));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Collects the `ad` and `photo` fields; anything else is drained and ignored.
pub(crate) async fn read_upload(mut payload: Multipart, max_photo_bytes: usize) -> ApiResult<UploadForm> {
    const MAX_AD_JSON_BYTES: usize = 64 * 1024;
    let mut form = UploadForm::default();

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        match name.as_str() {
            "ad" => form.ad = Some(read_field(&mut field, MAX_AD_JSON_BYTES, "ad").await?),
            "photo" => form.photo = Some(read_field(&mut field, max_photo_bytes, "photo").await?),
            other => {
                log::debug!("ignoring unexpected multipart field {other:?}");
                while field.try_next().await.map_err(multipart_error)?.is_some() {}
            }
        }
    }
    Ok(form)
}

/// Sniffs the image format; unknown or unreadable content is rejected.
pub(crate) fn photo_upload(photos: &dyn PhotoStore, data: Option<Vec<u8>>) -> ApiResult<PhotoUpload> {
    let data = data.ok_or_else(|| ApiError(AppError::ValidationError("photo is required".into())))?;
    let extension = photos.sniff_extension(&data).ok_or_else(|| {
        ApiError(AppError::ValidationError(
            "photo must be a JPEG, PNG, WebP or GIF image".into(),
        ))
    })?;
    Ok(PhotoUpload { data, extension })
}
