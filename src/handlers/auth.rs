//! `POST /auth/signup`, `POST /auth/login`, `GET /auth/me` (spec.md §6).

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{build_logout_cookie, build_session_cookie, password, CurrentUser};
use crate::db;
use crate::error::{AppError, Result};
use crate::handlers::AppState;
use crate::ids;
use crate::models::PublicUser;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
struct MeResponse {
    user: Option<PublicUser>,
}

pub async fn signup(state: web::Data<AppState>, body: web::Json<SignupRequest>) -> Result<HttpResponse> {
    body.validate()?;
    let email = db::users::normalize_email(&body.email);
    let password_hash = password::hash_password(&body.password)?;
    let id = ids::generate();
    let user = db::users::create(&state.pool, &id, &email, &password_hash).await?;

    let cookie = build_session_cookie(&state.config.session, &user.id, &user.email, state.config.is_production())
        .map_err(|e| AppError::Transient(e.to_string()))?;

    Ok(HttpResponse::Created()
        .cookie(cookie)
        .json(PublicUser::from(&user)))
}

pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse> {
    body.validate()?;
    let email = db::users::normalize_email(&body.email);
    let user = db::users::find_by_email(&state.pool, &email)
        .await?
        .ok_or(AppError::AuthRequired)?;

    if !password::verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::AuthRequired);
    }

    let cookie = build_session_cookie(&state.config.session, &user.id, &user.email, state.config.is_production())
        .map_err(|e| AppError::Transient(e.to_string()))?;

    Ok(HttpResponse::Ok().cookie(cookie).json(PublicUser::from(&user)))
}

/// Clears the session cookie. Not named in spec.md §6, but a natural
/// completion of cookie-session auth (SPEC_FULL.md §2 "Session auth").
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    let cookie = build_logout_cookie(&state.config.session, state.config.is_production());
    HttpResponse::Ok().cookie(cookie).json(serde_json::json!({ "success": true }))
}

/// Unlike other routes, an absent/invalid session here is not an error — it
/// is simply `{user: null}` (spec.md §6: page routes get a redirect, but this
/// is the API probe the client calls to decide whether to redirect at all).
pub async fn me(req: HttpRequest) -> HttpResponse {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .map(|u| PublicUser {
            id: u.id.clone(),
            email: u.email.clone(),
        });
    HttpResponse::Ok().json(MeResponse { user })
}
