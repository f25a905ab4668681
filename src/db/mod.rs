//! Persistence layer (spec.md §3 / §4 "Persistence layer" component).
//!
//! One repository module per entity, grounded on the runtime-checked
//! `sqlx::query_as::<_, T>(...)` style used throughout
//! `feed-service/src/db/trending_repo.rs` — no compile-time `query!` macros,
//! so the build doesn't depend on a reachable database or a checked-in
//! `sqlx-data.json` offline cache.

pub mod entries;
pub mod events;
pub mod ranking_events;
pub mod time_prefs;
pub mod users;

pub type Pool = sqlx::PgPool;

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Pool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
