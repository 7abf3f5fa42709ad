//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::colors::Color;
use crate::error::Result;
use crate::models::{
    Ad, AdUpdate, Animal, Breed, GeoPoint, Locality, PhotoUpload, Region, RespAd, SearchFilter,
    SearchHistory, User,
};
use crate::ranking::RankingContext;

/// Persistence contract for ads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdRepo: Send + Sync {
    /// Filtered, ordered and paginated search.
    ///
    /// Implementations evaluate [`RankingContext::plan`] in the query itself: the
    /// radius disc filters, the score terms order, and `LIMIT`/`OFFSET` come last.
    async fn search_ads(&self, filter: &SearchFilter, ranking: &RankingContext) -> Result<Vec<RespAd>>;

    /// Enriched read; `NotFound` if absent.
    async fn get_ad(&self, id: Uuid) -> Result<RespAd>;

    /// Enriched reads of whichever of `ids` exist, in no particular order.
    async fn get_ads(&self, ids: &[Uuid]) -> Result<Vec<RespAd>>;

    /// `InvalidReference` when the owner, animal or breed does not exist.
    async fn create_ad(&self, ad: &Ad) -> Result<()>;

    /// Applies the present fields of `update` and stamps `updated_at`.
    async fn update_ad(&self, id: Uuid, update: &AdUpdate, now: DateTime<Utc>) -> Result<()>;

    async fn delete_ad(&self, id: Uuid) -> Result<()>;
}

/// Single-row-per-user store of the last meaningful search.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchHistoryRepo: Send + Sync {
    async fn get_history(&self, user_id: Uuid) -> Result<Option<SearchHistory>>;

    /// Replaces the user's previous record entirely.
    async fn upsert_history(&self, history: &SearchHistory) -> Result<()>;
}

/// Resolves where a user lives, for radius searches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserLocator: Send + Sync {
    /// `Ok(None)` when the user has not set a locality.
    async fn locate_user(&self, user_id: Uuid) -> Result<Option<GeoPoint>>;
}

/// Account persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user_by_id(&self, id: Uuid) -> Result<User>;
    async fn get_user_by_username(&self, username: &str) -> Result<User>;
    /// `Conflict` when the username is taken.
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn set_locality(&self, user_id: Uuid, locality_id: Uuid) -> Result<()>;
}

/// Reference data: animals, breeds, regions and localities.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    // Animal Operations
    async fn list_animals(&self) -> Result<Vec<Animal>>;
    async fn get_animal(&self, id: Uuid) -> Result<Animal>;
    async fn add_animal(&self, animal: &Animal) -> Result<()>;
    async fn remove_animal(&self, id: Uuid) -> Result<()>;

    // Breed Operations
    async fn list_breeds(&self, animal_id: Option<Uuid>) -> Result<Vec<Breed>>;
    async fn get_breed(&self, id: Uuid) -> Result<Breed>;
    async fn add_breed(&self, breed: &Breed) -> Result<()>;
    async fn remove_breed(&self, id: Uuid) -> Result<()>;

    // Region Operations
    async fn list_regions(&self) -> Result<Vec<Region>>;
    async fn get_region(&self, id: Uuid) -> Result<Region>;
    async fn add_region(&self, region: &Region) -> Result<()>;
    async fn remove_region(&self, id: Uuid) -> Result<()>;

    // Locality Operations
    async fn list_localities(&self, region_id: Option<Uuid>) -> Result<Vec<Locality>>;
    async fn get_locality(&self, id: Uuid) -> Result<Locality>;
    async fn add_locality(&self, locality: &Locality) -> Result<()>;
    async fn remove_locality(&self, id: Uuid) -> Result<()>;
}

/// Photo storage contract for ad uploads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Detects the file extension (with leading dot) from the content; `None` if unsupported.
    fn sniff_extension(&self, data: &[u8]) -> Option<String>;

    /// Stores `data` under `key` + `extension`, replacing any previous file; returns the file name.
    async fn write(&self, key: &str, extension: &str, data: &[u8]) -> Result<String>;

    /// Removes a stored file by name. Removing a missing file is not an error.
    async fn remove(&self, file_name: &str) -> Result<()>;
}

/// External photo classifier that derives metadata for an ad.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DescriptionService: Send + Sync {
    async fn describe(&self, ad_id: Uuid, photo: &PhotoUpload) -> Result<()>;
    async fn forget(&self, ad_id: Uuid) -> Result<()>;
}

/// Coat colour tags derived from ad photos, one per ad.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ColorRepo: Send + Sync {
    async fn get_color(&self, ad_id: Uuid) -> Result<Option<Color>>;

    /// Inserts or replaces the ad's tag.
    async fn set_color(&self, ad_id: Uuid, color: Color, now: DateTime<Utc>) -> Result<()>;

    /// Removing a missing tag is not an error.
    async fn remove_color(&self, ad_id: Uuid) -> Result<()>;

    /// Tags of every ad still in `Actual` status.
    async fn active_colors(&self) -> Result<Vec<(Uuid, Color)>>;
}

/// Finds the animal's coat colour on a photo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoClassifier: Send + Sync {
    /// `Ok(None)` when no single animal can be recognised.
    async fn classify(&self, photo: &PhotoUpload) -> Result<Option<Color>>;
}

/// Identity and authorization contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Produces a self-describing password hash for storage
    fn hash_password(&self, password: &str) -> Result<String>;

    /// Checks a password against a hash produced by `hash_password`
    fn verify_password(&self, password: &str, hash: &str) -> bool;

    /// Issues a bearer token identifying the user
    fn issue_token(&self, user_id: Uuid) -> String;

    /// Resolves a bearer token back to its user, if valid
    fn authenticate(&self, token: &str) -> Option<Uuid>;

    /// Verifies the credential presented for privileged endpoints
    async fn verify_admin(&self, credential: &str) -> bool;
}
