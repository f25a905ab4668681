//! HTTP surface (spec.md §6 "External interfaces"), grouped one module per
//! resource the way `content-service/src/handlers/` and
//! `feed-service/src/handlers/` split theirs, wired through a single
//! `web::Data<AppState>` the way `feed-service`'s `FeedHandlerState` bundles
//! its dependencies.

pub mod admin;
pub mod auth;
pub mod engagement;
pub mod feed;
pub mod links;
pub mod unfurl;
pub mod upload;

use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::config::Config;
use crate::db::Pool;
use crate::services::ingestor::IngestService;

pub struct AppState {
    pub pool: Pool,
    pub ingest: Arc<IngestService>,
    pub config: Config,
}

/// Process liveness probe, unauthenticated (SPEC_FULL.md §6 ambient addition).
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::scope("/auth")
                .route("/signup", web::post().to(auth::signup))
                .route("/login", web::post().to(auth::login))
                .route("/logout", web::post().to(auth::logout))
                .route("/me", web::get().to(auth::me)),
        )
        .service(
            web::scope("/links")
                .route("", web::post().to(links::create))
                .route("", web::get().to(links::list))
                .route("/{id}", web::patch().to(links::patch))
                .route("/{id}", web::delete().to(links::delete)),
        )
        .service(
            web::scope("/upload")
                .route("", web::post().to(upload::create))
                .route("", web::put().to(upload::bulk)),
        )
        .route("/unfurl", web::post().to(unfurl::unfurl))
        .route("/engagement", web::post().to(engagement::ingest))
        .route("/feed", web::get().to(feed::get_feed))
        .service(web::scope("/admin").route("/export", web::get().to(admin::export)));
}
