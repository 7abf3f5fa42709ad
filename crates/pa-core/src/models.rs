//! # Domain Models
//!
//! These structs represent the core entities of Pet Adopter.
//! Every entity is identified by a random UUID v4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an ad. `Realised` and `Cancelled` are terminal.
///
/// The single-letter codes are what the API speaks and what the database stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdStatus {
    #[serde(rename = "A", alias = "Actual")]
    Actual,
    #[serde(rename = "R", alias = "Realised")]
    Realised,
    #[serde(rename = "C", alias = "Cancelled")]
    Cancelled,
}

impl AdStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            AdStatus::Actual => "A",
            AdStatus::Realised => "R",
            AdStatus::Cancelled => "C",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(AdStatus::Actual),
            "R" => Some(AdStatus::Realised),
            "C" => Some(AdStatus::Cancelled),
            _ => None,
        }
    }
}

/// The only statuses an owner may close an ad with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseStatus {
    #[serde(rename = "R", alias = "Realised")]
    Realised,
    #[serde(rename = "C", alias = "Cancelled")]
    Cancelled,
}

impl From<CloseStatus> for AdStatus {
    fn from(status: CloseStatus) -> Self {
        match status {
            CloseStatus::Realised => AdStatus::Realised,
            CloseStatus::Cancelled => AdStatus::Cancelled,
        }
    }
}

/// A pet adoption listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: AdStatus,
    /// File name of the photo handled by the `PhotoStore`
    pub photo_url: String,
    pub title: String,
    pub description: String,
    pub animal_id: Uuid,
    pub breed_id: Uuid,
    pub price: i64,
    pub contacts: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied fields of a new ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub animal_id: Uuid,
    pub breed_id: Uuid,
    pub price: i64,
    #[serde(default)]
    pub contacts: String,
}

/// Partial update of an ad.
///
/// `None` leaves the column untouched; `Some` overwrites it, so `Some(String::new())`
/// clears a text field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub animal_id: Option<Uuid>,
    pub breed_id: Option<Uuid>,
    pub price: Option<i64>,
    pub contacts: Option<String>,
}

/// Column-level changes handed to the repository.
///
/// Photo and status are never client-patchable; the ad service sets them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdUpdate {
    pub patch: AdPatch,
    pub photo_url: Option<String>,
    pub status: Option<AdStatus>,
}

/// Raw photo bytes with the extension detected from their content (e.g. ".png").
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub data: Vec<u8>,
    pub extension: String,
}

/// Display fields joined in at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdInfo {
    pub username: String,
    pub animal_name: String,
    pub breed_name: String,
    /// `None` when the owner never picked a locality
    pub locality_name: Option<String>,
}

/// An ad as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespAd {
    pub info: Ad,
    pub extra_info: AdInfo,
}

/// A point on the globe in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Filters of a single search request. Never persisted as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub owner_id: Option<Uuid>,
    pub animal_id: Option<Uuid>,
    pub breed_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Kilometres around the requester's locality
    pub radius: Option<u32>,
    /// Include `Realised` and `Cancelled` ads
    pub all_statuses: bool,
    pub limit: u32,
    pub offset: u32,
}

impl SearchFilter {
    /// True when the filter carries something worth remembering as history.
    pub fn is_meaningful(&self) -> bool {
        self.animal_id.is_some()
            || self.breed_id.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
            || self.radius.is_some()
    }
}

/// A user's most recent meaningful search. One row per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistory {
    pub user_id: Uuid,
    pub animal_id: Option<Uuid>,
    pub breed_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub radius: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl SearchHistory {
    /// Snapshot of the filter; owner and pagination are deliberately left out.
    pub fn from_filter(user_id: Uuid, filter: &SearchFilter, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            animal_id: filter.animal_id,
            breed_id: filter.breed_id,
            min_price: filter.min_price,
            max_price: filter.max_price,
            radius: filter.radius,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breed {
    pub id: Uuid,
    pub animal_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub id: Uuid,
    pub region_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
}

impl Locality {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub locality_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
