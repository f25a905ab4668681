use sqlx::types::Json;

use crate::db::Pool;
use crate::error::Result;
use crate::models::RankingEvent;

pub struct NewRankingEvent<'a> {
    pub feed_request_id: &'a str,
    pub link_id: &'a str,
    pub user_id: &'a str,
    pub candidate_rank: i64,
    pub served_rank: Option<i64>,
    pub base_score: f64,
    pub rerank_score: Option<f64>,
    pub final_score: f64,
    pub features: &'a std::collections::HashMap<String, f64>,
    pub algorithm_version: &'a str,
    pub reranker_version: Option<&'a str>,
    pub active_category: &'a str,
    pub cards_shown: i64,
}

/// Best-effort logging: duplicate `(feedRequestId, linkId)` is silently
/// dropped rather than surfaced (spec.md §5 "best-effort logging").
pub async fn insert_batch(pool: &Pool, events: &[NewRankingEvent<'_>]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for e in events {
        sqlx::query(
            r#"
            INSERT INTO ranking_events (
                feed_request_id, link_id, user_id, candidate_rank, served_rank,
                base_score, rerank_score, final_score, features, algorithm_version,
                reranker_version, active_category, cards_shown
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (feed_request_id, link_id) DO NOTHING
            "#,
        )
        .bind(e.feed_request_id)
        .bind(e.link_id)
        .bind(e.user_id)
        .bind(e.candidate_rank)
        .bind(e.served_rank)
        .bind(e.base_score)
        .bind(e.rerank_score)
        .bind(e.final_score)
        .bind(Json(e.features))
        .bind(e.algorithm_version)
        .bind(e.reranker_version)
        .bind(e.active_category)
        .bind(e.cards_shown)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

type Row = (
    String,
    String,
    i64,
    Option<i64>,
    f64,
    Option<f64>,
    f64,
    Json<std::collections::HashMap<String, f64>>,
    String,
    Option<String>,
    String,
    i64,
    chrono::DateTime<chrono::Utc>,
);

/// Ranking events for a user within a window, used by the exporter to join
/// against engagement outcomes (spec.md §4.8).
pub async fn list_for_user_since(
    pool: &Pool,
    user_id: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<RankingEvent>> {
    let rows: Vec<Row> = sqlx::query_as(
        r#"
        SELECT feed_request_id, link_id, candidate_rank, served_rank, base_score,
               rerank_score, final_score, features, algorithm_version,
               reranker_version, active_category, cards_shown, created_at
        FROM ranking_events
        WHERE user_id = $1 AND created_at >= $2
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| RankingEvent {
            feed_request_id: r.0,
            link_id: r.1,
            candidate_rank: r.2,
            served_rank: r.3,
            base_score: r.4,
            rerank_score: r.5,
            final_score: r.6,
            features: r.7 .0,
            algorithm_version: r.8,
            reranker_version: r.9,
            active_category: r.10,
            cards_shown: r.11,
            created_at: r.12,
        })
        .collect())
}
