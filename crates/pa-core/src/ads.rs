//! # Ad Service
//!
//! Lifecycle of a single ad: creation with its photo, owner-checked mutations and
//! privileged deletion.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Ad, AdForm, AdPatch, AdStatus, AdUpdate, CloseStatus, PhotoUpload, RespAd};
use crate::traits::{AdRepo, PhotoStore};
use crate::validation::{validate_ad_form, validate_ad_patch};

pub struct AdService {
    repo: Arc<dyn AdRepo>,
    photos: Arc<dyn PhotoStore>,
}

impl AdService {
    pub fn new(repo: Arc<dyn AdRepo>, photos: Arc<dyn PhotoStore>) -> Self {
        Self { repo, photos }
    }

    pub async fn get_ad(&self, id: Uuid) -> Result<RespAd> {
        self.repo.get_ad(id).await
    }

    /// Writes the photo first, then the row. A failed insert removes the orphaned photo.
    pub async fn create_ad(&self, owner_id: Uuid, form: AdForm, photo: &PhotoUpload) -> Result<RespAd> {
        validate_ad_form(&form)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let photo_url = self
            .photos
            .write(&id.to_string(), &photo.extension, &photo.data)
            .await?;

        let ad = Ad {
            id,
            owner_id,
            status: AdStatus::Actual,
            photo_url,
            title: form.title,
            description: form.description,
            animal_id: form.animal_id,
            breed_id: form.breed_id,
            price: form.price,
            contacts: form.contacts,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.repo.create_ad(&ad).await {
            if let Err(cleanup) = self.photos.remove(&ad.photo_url).await {
                log::warn!("failed to remove photo {} of rejected ad: {cleanup}", ad.photo_url);
            }
            return Err(err);
        }

        log::info!("ad {id} created by user {owner_id}");
        self.repo.get_ad(id).await
    }

    /// Fetches the ad and rejects anyone but its owner.
    async fn owned_ad(&self, requester: Uuid, id: Uuid) -> Result<RespAd> {
        let current = self.repo.get_ad(id).await?;
        if current.info.owner_id != requester {
            log::warn!("user {requester} tried to modify ad {id} they do not own");
            return Err(AppError::NotOwner);
        }
        Ok(current)
    }

    pub async fn update_ad(&self, requester: Uuid, id: Uuid, patch: AdPatch) -> Result<RespAd> {
        validate_ad_patch(&patch)?;
        self.owned_ad(requester, id).await?;

        let update = AdUpdate {
            patch,
            ..Default::default()
        };
        self.repo.update_ad(id, &update, Utc::now()).await?;
        self.repo.get_ad(id).await
    }

    /// Replaces the photo file; the new one keeps the ad's id as its name.
    ///
    /// The new file is written before the row changes and the old file is removed
    /// last, so the row never points at a missing photo.
    pub async fn update_photo(&self, requester: Uuid, id: Uuid, photo: &PhotoUpload) -> Result<RespAd> {
        let current = self.owned_ad(requester, id).await?;
        let old_url = current.info.photo_url;

        let photo_url = self
            .photos
            .write(&id.to_string(), &photo.extension, &photo.data)
            .await?;

        let update = AdUpdate {
            photo_url: Some(photo_url.clone()),
            ..Default::default()
        };
        if let Err(err) = self.repo.update_ad(id, &update, Utc::now()).await {
            if photo_url != old_url {
                if let Err(cleanup) = self.photos.remove(&photo_url).await {
                    log::warn!("failed to remove unused photo {photo_url}: {cleanup}");
                }
            }
            return Err(err);
        }

        if photo_url != old_url {
            if let Err(err) = self.photos.remove(&old_url).await {
                log::warn!("failed to remove replaced photo {old_url} of ad {id}: {err}");
            }
        }
        self.repo.get_ad(id).await
    }

    /// Moves the ad to a terminal status.
    pub async fn close(&self, requester: Uuid, id: Uuid, status: CloseStatus) -> Result<RespAd> {
        self.owned_ad(requester, id).await?;

        let update = AdUpdate {
            status: Some(status.into()),
            ..Default::default()
        };
        self.repo.update_ad(id, &update, Utc::now()).await?;
        log::info!("ad {id} closed as {:?}", AdStatus::from(status));
        self.repo.get_ad(id).await
    }

    /// Ownership-independent; callers must gate it behind the admin policy.
    pub async fn delete_ad(&self, id: Uuid) -> Result<()> {
        let current = self.repo.get_ad(id).await?;
        self.photos.remove(&current.info.photo_url).await?;
        self.repo.delete_ad(id).await?;
        log::info!("ad {id} deleted");
        Ok(())
    }
}
