//! Request extractors for the three access levels: anonymous, authenticated and admin.

use std::collections::HashMap;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use pa_core::error::AppError;
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::AppState;

/// Header carrying the admin credential.
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

fn state(req: &HttpRequest) -> Result<&web::Data<AppState>, ApiError> {
    req.app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError(AppError::Internal("application state is not configured".into())))
}

/// `Ok(None)` without an `Authorization` header; a present but invalid token is an error.
fn bearer_user(req: &HttpRequest) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError(AppError::Unauthorized("expected a bearer token".into())))?;

    state(req)?
        .auth
        .authenticate(token)
        .map(Some)
        .ok_or_else(|| ApiError(AppError::Unauthorized("invalid token".into())))
}

/// The caller's identity if they sent a valid one.
///
/// A stale or foreign token degrades to an anonymous request.
pub struct MaybeAuth(pub Option<Uuid>);

impl FromRequest for MaybeAuth {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(match bearer_user(req) {
            Ok(user) => Ok(MaybeAuth(user)),
            Err(ApiError(AppError::Unauthorized(reason))) => {
                log::debug!("treating request as anonymous: {reason}");
                Ok(MaybeAuth(None))
            }
            Err(err) => Err(err),
        })
    }
}

/// Rejects the request with 401 unless a valid bearer token is present.
pub struct RequireAuth(pub Uuid);

impl FromRequest for RequireAuth {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(bearer_user(req).and_then(|user| {
            user.map(RequireAuth)
                .ok_or_else(|| ApiError(AppError::Unauthorized("authentication required".into())))
        }))
    }
}

/// Gate for privileged endpoints. The credential comes from the
/// `X-Admin-Token` header or, failing that, the `token` query parameter.
pub struct RequireAdmin;

fn admin_credential(req: &HttpRequest) -> Option<String> {
    if let Some(value) = req.headers().get(ADMIN_TOKEN_HEADER) {
        return value.to_str().ok().map(str::to_string);
    }
    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.into_inner().remove("token"))
}

impl FromRequest for RequireAdmin {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let credential = admin_credential(req);
        let state = state(req).cloned();

        Box::pin(async move {
            let state = state?;
            let credential = credential
                .ok_or_else(|| ApiError(AppError::Unauthorized("admin token required".into())))?;
            if state.auth.verify_admin(&credential).await {
                Ok(RequireAdmin)
            } else {
                log::warn!("rejected admin request with an invalid token");
                Err(ApiError(AppError::Forbidden("invalid admin token".into())))
            }
        })
    }
}
