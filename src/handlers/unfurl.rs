//! `POST /unfurl` (spec.md §6): metadata preview without persisting anything.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::services::ingestor;

#[derive(Debug, Deserialize, Validate)]
pub struct UnfurlRequest {
    #[validate(url)]
    pub url: String,
}

pub async fn unfurl(_user: CurrentUser, body: web::Json<UnfurlRequest>) -> Result<HttpResponse> {
    body.validate()?;
    let result = ingestor::unfurl(body.url.trim()).await?;
    Ok(HttpResponse::Ok().json(result))
}
