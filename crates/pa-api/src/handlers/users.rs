use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::AppState;
use crate::error::ApiResult;
use crate::extract::RequireAuth;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetLocality {
    pub locality_id: Uuid,
}

pub async fn signup(data: web::Data<AppState>, body: web::Json<Credentials>) -> ApiResult<HttpResponse> {
    let session = data.users.signup(&body.username, &body.password).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn login(data: web::Data<AppState>, body: web::Json<Credentials>) -> ApiResult<HttpResponse> {
    let session = data.users.login(&body.username, &body.password).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn current_user(data: web::Data<AppState>, user: RequireAuth) -> ApiResult<HttpResponse> {
    let user = data.users.current(user.0).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

pub async fn set_locality(
    data: web::Data<AppState>,
    user: RequireAuth,
    body: web::Json<SetLocality>,
) -> ApiResult<HttpResponse> {
    let user = data.users.set_locality(user.0, body.locality_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}
