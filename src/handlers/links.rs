//! `POST/GET /links`, `PATCH/DELETE /links/{id}` (spec.md §6).

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db;
use crate::error::{AppError, Result};
use crate::handlers::AppState;
use crate::models::EntryStatus;

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLinkRequest {
    #[validate(url)]
    pub url: String,
}

pub async fn create(state: web::Data<AppState>, user: CurrentUser, body: web::Json<CreateLinkRequest>) -> Result<HttpResponse> {
    body.validate()?;
    let entry = state.ingest.ingest_url(&state.pool, &user.id, body.url.trim()).await?;
    Ok(HttpResponse::Created().json(entry))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub stats: Option<bool>,
}

pub async fn list(state: web::Data<AppState>, user: CurrentUser, query: web::Query<ListQuery>) -> Result<HttpResponse> {
    if query.stats.unwrap_or(false) {
        let stats = db::entries::stats(&state.pool, &user.id).await?;
        return Ok(HttpResponse::Ok().json(serde_json::json!({
            "active": stats.active,
            "archived": stats.archived,
            "total": stats.total,
            "categories": stats.categories,
        })));
    }

    let status = match query.status.as_deref() {
        Some("active") => Some("active"),
        Some("archived") => Some("archived"),
        Some(other) => {
            return Err(AppError::Validation(format!("unknown status '{other}'")));
        }
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);

    let entries = db::entries::list_by_status(&state.pool, &user.id, status, limit).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchLinkRequest {
    pub status: Option<EntryStatus>,
    pub shown_count: Option<i64>,
    pub increment_shown: Option<i64>,
    pub liked: Option<bool>,
}

pub async fn patch(
    state: web::Data<AppState>,
    user: CurrentUser,
    id: web::Path<String>,
    body: web::Json<PatchLinkRequest>,
) -> Result<HttpResponse> {
    let updated = db::entries::patch(
        &state.pool,
        &user.id,
        &id,
        db::entries::Patch {
            status: body.status,
            shown_count: body.shown_count,
            increment_shown: body.increment_shown,
            liked: body.liked,
        },
    )
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete(state: web::Data<AppState>, user: CurrentUser, id: web::Path<String>) -> Result<HttpResponse> {
    let deleted = db::entries::delete(&state.pool, &user.id, &id).await?;
    if !deleted {
        return Err(AppError::NotFound);
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
