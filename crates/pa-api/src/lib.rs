//! # pa-api
//!
//! The web routing and orchestration layer for Pet Adopter.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod params;

use actix_web::web;

use crate::error::bad_request;
use crate::handlers::{ads, catalog, users};

pub use handlers::AppState;

/// Mounts the JSON API under `/api/v1`.
///
/// Extractor failures (bad query strings, malformed ids, broken JSON) answer with
/// the same `{"error": ...}` body as every other failure.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(web::QueryConfig::default().error_handler(|err, _| bad_request(err)))
            .app_data(web::PathConfig::default().error_handler(|err, _| bad_request(err)))
            .app_data(web::JsonConfig::default().error_handler(|err, _| bad_request(err)))
            // Ads
            .route("/ads", web::get().to(ads::search_ads))
            .route("/ads/create", web::post().to(ads::create_ad))
            .route("/ads/{id}", web::get().to(ads::get_ad))
            .route("/ads/{id}/same", web::get().to(ads::same_ads))
            .route("/ads/{id}/update", web::post().to(ads::update_ad))
            .route("/ads/{id}/update_photo", web::post().to(ads::update_photo))
            .route("/ads/{id}/close", web::post().to(ads::close_ad))
            .route("/ads/{id}/delete", web::post().to(ads::delete_ad))
            // Users
            .route("/user", web::get().to(users::current_user))
            .route("/user/signup", web::post().to(users::signup))
            .route("/user/login", web::post().to(users::login))
            .route("/user/set_locality", web::post().to(users::set_locality))
            // Catalog
            .route("/animals", web::get().to(catalog::list_animals))
            .route("/animals/add", web::post().to(catalog::add_animal))
            .route("/animals/remove", web::post().to(catalog::remove_animal))
            .route("/animals/{id}", web::get().to(catalog::get_animal))
            .route("/breeds", web::get().to(catalog::list_breeds))
            .route("/breeds/add", web::post().to(catalog::add_breed))
            .route("/breeds/remove", web::post().to(catalog::remove_breed))
            .route("/breeds/{id}", web::get().to(catalog::get_breed))
            .route("/regions", web::get().to(catalog::list_regions))
            .route("/regions/add", web::post().to(catalog::add_region))
            .route("/regions/remove", web::post().to(catalog::remove_region))
            .route("/regions/{id}", web::get().to(catalog::get_region))
            .route("/localities", web::get().to(catalog::list_localities))
            .route("/localities/add", web::post().to(catalog::add_locality))
            .route("/localities/remove", web::post().to(catalog::remove_locality))
            .route("/localities/{id}", web::get().to(catalog::get_locality)),
    );
}
