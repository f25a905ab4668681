//! `GET /feed` (spec.md §4.7, §6): the full candidate → score → rerank →
//! diversify → paginate → log pipeline for one feed request.

use chrono::{Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use actix_web::{web, HttpResponse};

use crate::auth::CurrentUser;
use crate::db;
use crate::error::Result;
use crate::handlers::AppState;
use crate::ids;
use crate::models::{DayType, LibraryEntry, ALGORITHM_VERSION};
use crate::services::{diversity, reranker, scoring};

const MAX_LIMIT: i64 = 50;
const DEFAULT_LIMIT: i64 = 20;
const MAX_SEMANTIC_IDS: usize = 48;
const MIN_LOG_CANDIDATES: usize = 60;
const LOG_CANDIDATES_MULTIPLIER: usize = 3;

fn parse_csv(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "excludeIds")]
    pub exclude_ids: Option<String>,
    #[serde(rename = "engagedIds")]
    pub engaged_ids: Option<String>,
    #[serde(rename = "engagedCats")]
    pub engaged_cats: Option<String>,
    #[serde(rename = "skippedCats")]
    pub skipped_cats: Option<String>,
    #[serde(rename = "cardsShown")]
    pub cards_shown: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedResponse {
    links: Vec<LibraryEntry>,
    categories: Vec<String>,
    total: i64,
    filtered: i64,
    feed_request_id: String,
    algorithm_version: String,
    reranker_applied: bool,
    reranker_version: Option<String>,
}

pub async fn get_feed(state: web::Data<AppState>, user: CurrentUser, query: web::Query<FeedQuery>) -> Result<HttpResponse> {
    let category = query.category.clone().unwrap_or_else(|| "All".to_string());
    let category_filter = if category == "All" { None } else { Some(category.as_str()) };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);
    let cards_shown = query.cards_shown.unwrap_or(0).max(0);

    let exclude_ids = parse_csv(&query.exclude_ids);
    let mut engaged_ids = parse_csv(&query.engaged_ids);
    if engaged_ids.len() > MAX_SEMANTIC_IDS {
        engaged_ids = engaged_ids.split_off(engaged_ids.len() - MAX_SEMANTIC_IDS);
    }
    let engaged_cats = parse_csv(&query.engaged_cats);
    let skipped_cats = parse_csv(&query.skipped_cats);

    let (candidates, tab_categories, embeddings) = tokio::try_join!(
        db::entries::list_candidates(&state.pool, &user.id, category_filter, &exclude_ids),
        db::entries::list_active_categories(&state.pool, &user.id),
        db::entries::fetch_embeddings(&state.pool, &user.id, &engaged_ids),
    )?;

    let filtered = candidates.len() as i64;
    let total = db::entries::stats(&state.pool, &user.id).await?.active;

    let engaged_embeddings: Vec<Vec<f32>> = engaged_ids
        .iter()
        .filter_map(|id| embeddings.get(id).cloned())
        .collect();

    let now = Utc::now();
    let hour_slot = now.hour() as i16;
    let day_type = DayType::from_day_of_week(now.weekday().num_days_from_sunday() as i16);
    let all_time_prefs = db::time_prefs::list_for_user(&state.pool, &user.id).await?;
    let time_prefs: Vec<_> = all_time_prefs
        .into_iter()
        .filter(|p| p.hour_slot == hour_slot && p.day_type == day_type)
        .collect();

    let session = scoring::SessionContext::new(engaged_ids, engaged_cats, skipped_cats, engaged_embeddings, cards_shown);

    let scored = scoring::score(candidates, &session, &time_prefs, now);
    let rerank_outcome = reranker::apply(scored, state.config.reranker.enabled, &state.config.reranker.model_path);
    let diversified = diversity::apply(rerank_outcome.candidates);

    let feed_request_id = ids::generate();
    let log_cap = (limit as usize * LOG_CANDIDATES_MULTIPLIER).max(MIN_LOG_CANDIDATES);
    let offset_usize = offset as usize;
    let limit_usize = limit as usize;

    let mut log_rows = Vec::with_capacity(log_cap.min(diversified.len()));
    for (idx, candidate) in diversified.iter().enumerate().take(log_cap) {
        let served_rank = if idx >= offset_usize && idx < offset_usize + limit_usize {
            Some((idx - offset_usize + 1) as i64)
        } else {
            None
        };
        log_rows.push(db::ranking_events::NewRankingEvent {
            feed_request_id: &feed_request_id,
            link_id: &candidate.entry.id,
            user_id: &user.id,
            candidate_rank: (idx + 1) as i64,
            served_rank,
            base_score: candidate.base_score,
            rerank_score: candidate.rerank_score,
            final_score: candidate.final_score,
            features: &candidate.features,
            algorithm_version: ALGORITHM_VERSION,
            reranker_version: rerank_outcome.version.as_deref(),
            active_category: &category,
            cards_shown,
        });
    }
    if let Err(e) = db::ranking_events::insert_batch(&state.pool, &log_rows).await {
        tracing::warn!("ranking event logging failed, response unaffected: {}", e);
    }

    let links: Vec<LibraryEntry> = diversified
        .into_iter()
        .skip(offset_usize)
        .take(limit_usize)
        .map(|c| c.entry.without_embedding())
        .collect();

    Ok(HttpResponse::Ok().json(FeedResponse {
        links,
        categories: tab_categories,
        total,
        filtered,
        feed_request_id,
        algorithm_version: ALGORITHM_VERSION.to_string(),
        reranker_applied: rerank_outcome.applied,
        reranker_version: rerank_outcome.version,
    }))
}
