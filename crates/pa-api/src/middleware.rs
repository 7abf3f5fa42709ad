//! pet-adopter/crates/pa-api/src/middleware.rs Middleware
//!
//! Access logging and CORS for the JSON API.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;

use crate::extract::ADMIN_TOKEN_HEADER;

// Outputs: remote-ip "request-line" status-code response-size "referrer" "user-agent" time
pub fn standard_middleware() -> Logger {
    Logger::default()
}

// The browser front end is served from a different origin.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .allowed_header(ADMIN_TOKEN_HEADER)
        .max_age(3600)
}
