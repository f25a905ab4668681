//! `GET /admin/export?days=D` (SPEC_FULL.md §4.8/§6 ambient addition): the
//! training-dataset exporter's HTTP trigger, scoped to the caller's own
//! data like every other route (spec.md §5 "All requests filter by
//! `userId`").

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::handlers::AppState;
use crate::services::export;

const DEFAULT_EXPORT_DAYS: i64 = 30;
const MAX_EXPORT_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub days: Option<i64>,
}

pub async fn export(state: web::Data<AppState>, user: CurrentUser, query: web::Query<ExportQuery>) -> Result<HttpResponse> {
    let days = query.days.unwrap_or(DEFAULT_EXPORT_DAYS).clamp(1, MAX_EXPORT_DAYS);
    let records = export::export_training_data(&state.pool, &user.id, days).await?;
    let jsonl = export::to_jsonl(&records)?;

    Ok(HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .body(jsonl))
}
