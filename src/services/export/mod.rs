//! Training-dataset exporter (spec.md §4.8, §6 "Training-dataset JSONL").
//!
//! Joins `ranking_events` rows created within the last `D` days against
//! their engagement outcomes, computes a reward label, and serializes one
//! newline-delimited JSON object per ranking-event row — the same
//! `serde_json::to_string` + join-by-newline shape the rest of this corpus
//! uses for outbox/event serialization (e.g. `libs/event-schema/src/outbox.rs`).
//! Scoped per user, consistent with the ownership invariant that every query
//! filters by `userId` (spec.md §5 "All requests filter by `userId`").

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::{entries, events, ranking_events, Pool};
use crate::error::Result;
use crate::models::{EngagementEvent, EventType, RankingEvent};

/// Dwell events shorter than this are treated as a "fast skip" (spec.md
/// §4.8 `fastSkipCount`).
const FAST_SKIP_THRESHOLD_MS: i64 = 1500;
/// Outcomes are only joined to a ranking event within this window after it.
const OUTCOME_WINDOW: Duration = Duration::hours(6);

#[derive(Debug, Clone, Serialize)]
pub struct ExportRecord {
    pub feed_request_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub link_id: String,
    pub algorithm_version: String,
    pub reranker_version: Option<String>,
    pub active_category: String,
    pub candidate_rank: i64,
    pub served_rank: Option<i64>,
    pub base_score: f64,
    pub rerank_score: Option<f64>,
    pub final_score: f64,
    pub created_at: DateTime<Utc>,
    pub content_type: crate::models::ContentType,
    pub categories: Vec<String>,
    pub open_count: i64,
    pub max_dwell_ms: i64,
    pub avg_dwell_ms: f64,
    pub fast_skip_count: i64,
    pub liked: bool,
    pub reward: f64,
    pub features: HashMap<String, f64>,
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Engagement events for `link_id` that count as an outcome of `ranking`:
/// created within `OUTCOME_WINDOW` after it, and — when the engagement event
/// carries a `feedRequestId` — matching the ranking event's (spec.md §4.8
/// "scoped to the same session and feed request when present").
fn matching_outcomes<'a>(
    ranking: &RankingEvent,
    events_by_link: &'a HashMap<String, Vec<EngagementEvent>>,
) -> Vec<&'a EngagementEvent> {
    let window_end = ranking.created_at + OUTCOME_WINDOW;
    events_by_link
        .get(&ranking.link_id)
        .into_iter()
        .flatten()
        .filter(|e| e.created_at > ranking.created_at && e.created_at <= window_end)
        .filter(|e| match &e.feed_request_id {
            Some(fid) => fid == &ranking.feed_request_id,
            None => true,
        })
        .collect()
}

fn reward_for(served: bool, open_count: i64, max_dwell_ms: i64, liked: bool, fast_skip_count: i64) -> f64 {
    if !served {
        return 0.0;
    }
    let open_reward = if open_count > 0 { 1.0 } else { 0.0 };
    let dwell_reward = clamp01(max_dwell_ms as f64 / 45_000.0);
    let liked_bonus = if liked { 0.35 } else { 0.0 };
    let skip_penalty = if fast_skip_count > 0 { 0.3 } else { 0.0 };
    clamp01(open_reward * 0.6 + dwell_reward * 0.35 + liked_bonus - skip_penalty)
}

pub async fn export_training_data(pool: &Pool, user_id: &str, days: i64) -> Result<Vec<ExportRecord>> {
    let since = Utc::now() - Duration::days(days.max(0));

    let ranking = ranking_events::list_for_user_since(pool, user_id, since).await?;
    if ranking.is_empty() {
        return Ok(Vec::new());
    }

    let engagement = events::list_for_user_since(pool, user_id, since).await?;
    let mut events_by_link: HashMap<String, Vec<EngagementEvent>> = HashMap::new();
    for e in engagement {
        events_by_link.entry(e.link_id.clone()).or_default().push(e);
    }

    let link_ids: Vec<String> = {
        let mut ids: Vec<String> = ranking.iter().map(|r| r.link_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    };
    let fields = entries::fetch_export_fields(pool, user_id, &link_ids).await?;

    let mut records = Vec::with_capacity(ranking.len());
    for r in ranking {
        let served = r.served_rank.is_some();
        let outcomes = matching_outcomes(&r, &events_by_link);

        let open_count = outcomes.iter().filter(|e| e.event_type == EventType::Open).count() as i64;
        let dwell_values: Vec<i64> = outcomes
            .iter()
            .filter(|e| e.event_type == EventType::Dwell)
            .filter_map(|e| e.dwell_time_ms)
            .collect();
        let max_dwell_ms = dwell_values.iter().copied().max().unwrap_or(0);
        let fast_skip_count = dwell_values.iter().filter(|&&d| d < FAST_SKIP_THRESHOLD_MS).count() as i64;
        let session_id = outcomes.iter().find_map(|e| e.session_id.clone());

        let entry_fields = fields.get(&r.link_id);
        let content_type = entry_fields
            .map(|f| f.content_type.clone())
            .unwrap_or(crate::models::ContentType::Generic);
        let categories = entry_fields.map(|f| f.categories.clone()).unwrap_or_default();
        let liked = entry_fields.map(|f| f.liked).unwrap_or(false);
        let avg_dwell_ms = entry_fields.map(|f| f.avg_dwell_ms).unwrap_or(0.0);

        let reward = reward_for(served, open_count, max_dwell_ms, liked, fast_skip_count);

        records.push(ExportRecord {
            feed_request_id: r.feed_request_id,
            user_id: user_id.to_string(),
            session_id,
            link_id: r.link_id,
            algorithm_version: r.algorithm_version,
            reranker_version: r.reranker_version,
            active_category: r.active_category,
            candidate_rank: r.candidate_rank,
            served_rank: r.served_rank,
            base_score: r.base_score,
            rerank_score: r.rerank_score,
            final_score: r.final_score,
            created_at: r.created_at,
            content_type,
            categories,
            open_count,
            max_dwell_ms,
            avg_dwell_ms,
            fast_skip_count,
            liked,
            reward,
            features: r.features,
        });
    }

    Ok(records)
}

/// Serializes `records` as newline-delimited JSON (spec.md §6 "Training-dataset JSONL").
pub fn to_jsonl(records: &[ExportRecord]) -> Result<String> {
    let mut lines = Vec::with_capacity(records.len());
    for r in records {
        lines.push(serde_json::to_string(r)?);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;

    fn engagement(link_id: &str, event_type: EventType, created_at: DateTime<Utc>, dwell: Option<i64>) -> EngagementEvent {
        EngagementEvent {
            id: "e1".to_string(),
            user_id: "u1".to_string(),
            link_id: link_id.to_string(),
            event_type,
            dwell_time_ms: dwell,
            swipe_velocity: None,
            card_index: None,
            hour_of_day: 10,
            day_of_week: 2,
            session_id: Some("sess1".to_string()),
            feed_request_id: Some("fr1".to_string()),
            created_at,
        }
    }

    fn ranking(link_id: &str, feed_request_id: &str, served_rank: Option<i64>, created_at: DateTime<Utc>) -> RankingEvent {
        RankingEvent {
            feed_request_id: feed_request_id.to_string(),
            link_id: link_id.to_string(),
            candidate_rank: 1,
            served_rank,
            base_score: 0.5,
            rerank_score: None,
            final_score: 0.5,
            features: HashMap::new(),
            algorithm_version: "v1".to_string(),
            reranker_version: None,
            active_category: "All".to_string(),
            cards_shown: 0,
            created_at,
        }
    }

    #[test]
    fn reward_is_zero_for_unserved_candidates() {
        assert_eq!(reward_for(false, 5, 40_000, true, 0), 0.0);
    }

    #[test]
    fn reward_combines_open_dwell_like_and_skip_penalty() {
        let r = reward_for(true, 1, 45_000, true, 1);
        let expected = clamp01(1.0 * 0.6 + 1.0 * 0.35 + 0.35 - 0.3);
        assert!((r - expected).abs() < 1e-9);
    }

    #[test]
    fn matching_outcomes_respects_window_and_feed_request() {
        let base = Utc::now();
        let r = ranking("link1", "fr1", Some(0), base);

        let mut by_link: HashMap<String, Vec<EngagementEvent>> = HashMap::new();
        by_link.insert(
            "link1".to_string(),
            vec![
                engagement("link1", EventType::Open, base + Duration::minutes(5), None),
                engagement("link1", EventType::Dwell, base + Duration::hours(7), Some(2000)),
            ],
        );

        let outcomes = matching_outcomes(&r, &by_link);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].event_type, EventType::Open);
    }

    #[tokio::test]
    async fn to_jsonl_emits_one_line_per_record() {
        let record = ExportRecord {
            feed_request_id: "fr1".to_string(),
            user_id: "u1".to_string(),
            session_id: Some("sess1".to_string()),
            link_id: "link1".to_string(),
            algorithm_version: "v1".to_string(),
            reranker_version: None,
            active_category: "All".to_string(),
            candidate_rank: 1,
            served_rank: Some(0),
            base_score: 0.5,
            rerank_score: None,
            final_score: 0.5,
            created_at: Utc::now(),
            content_type: ContentType::Article,
            categories: vec!["Tech".to_string()],
            open_count: 1,
            max_dwell_ms: 10_000,
            avg_dwell_ms: 5_000.0,
            fast_skip_count: 0,
            liked: false,
            reward: 0.6,
            features: HashMap::new(),
        };
        let jsonl = to_jsonl(&[record.clone(), record]).unwrap();
        assert_eq!(jsonl.lines().count(), 2);
        assert!(jsonl.lines().next().unwrap().contains("\"link_id\":\"link1\""));
    }
}
