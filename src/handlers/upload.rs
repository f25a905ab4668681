//! `POST /upload` (single text/image item), `PUT /upload` (bulk urls)
//! (spec.md §6).

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::{AppError, Result};
use crate::handlers::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub text_content: Option<String>,
    pub image_data: Option<String>,
}

pub async fn create(state: web::Data<AppState>, user: CurrentUser, body: web::Json<UploadRequest>) -> Result<HttpResponse> {
    let entry = match body.kind.as_str() {
        "text" => {
            let text = body
                .text_content
                .as_deref()
                .ok_or_else(|| AppError::Validation("textContent is required".to_string()))?;
            state.ingest.ingest_text(&state.pool, &user.id, body.title.as_deref(), text).await?
        }
        "image" => {
            let image = body
                .image_data
                .as_deref()
                .ok_or_else(|| AppError::Validation("imageData is required".to_string()))?;
            state.ingest.ingest_image(&state.pool, &user.id, body.title.as_deref(), image).await?
        }
        other => {
            return Err(AppError::Validation(format!("unknown upload type '{other}'")));
        }
    };

    Ok(HttpResponse::Created().json(entry))
}

#[derive(Debug, Deserialize)]
pub struct BulkUploadRequest {
    pub urls: Vec<String>,
}

pub async fn bulk(state: web::Data<AppState>, user: CurrentUser, body: web::Json<BulkUploadRequest>) -> Result<HttpResponse> {
    let result = state.ingest.ingest_bulk(&state.pool, &user.id, body.into_inner().urls).await?;
    Ok(HttpResponse::Ok().json(result))
}
