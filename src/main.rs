use std::io;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use driftfeed::config::Config;
use driftfeed::handlers::AppState;
use driftfeed::{auth::SessionAuth, db, services::ingestor::IngestService};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,actix_web=info".into()))
        .with(tracing_subscriber::fmt::layer().json().with_target(true).with_line_number(true))
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!("configuration loading failed: {:#}", e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;

    tracing::info!("starting driftfeed v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(env = %config.app.env, port = config.app.port, "environment configured");

    let pool = db::connect(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| {
            tracing::error!("database connection failed: {:#}", e);
            io::Error::new(io::ErrorKind::Other, e)
        })?;

    db::run_migrations(&pool).await.map_err(|e| {
        tracing::error!("database migration failed: {:#}", e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;
    tracing::info!("database migrations applied");

    let ingest = Arc::new(IngestService::with_defaults());
    let port = config.app.port;
    let session_config = config.session.clone();

    let state = web::Data::new(AppState { pool, ingest, config });

    tracing::info!("listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(SessionAuth {
                config: session_config.clone(),
            })
            .configure(driftfeed::handlers::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
