//! Engagement ingestion (spec.md §4.4): one transaction per request, driven
//! entirely by `POST /engagement`. Grounded on `ranking-service`'s own
//! "server stamps timing fields, never trusts the client" convention and
//! the content-service's `AppError` taxonomy for validation failures.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::db;
use crate::db::Pool;
use crate::error::{AppError, Result};
use crate::ids;
use crate::models::{DayType, EventType};
use crate::services::scoring::signals::clamp01;

#[derive(Debug, Clone)]
pub struct IncomingEvent {
    pub link_id: String,
    pub event_type: String,
    pub dwell_time_ms: Option<i64>,
    pub swipe_velocity: Option<f64>,
    pub card_index: Option<i32>,
    pub session_id: Option<String>,
    pub feed_request_id: Option<String>,
}

struct ValidEvent {
    link_id: String,
    event_type: EventType,
    dwell_time_ms: Option<i64>,
    swipe_velocity: Option<f64>,
    card_index: Option<i32>,
    session_id: Option<String>,
    feed_request_id: Option<String>,
}

fn validate(events: Vec<IncomingEvent>) -> Vec<ValidEvent> {
    events
        .into_iter()
        .filter_map(|e| {
            if e.link_id.trim().is_empty() {
                return None;
            }
            let event_type = EventType::parse(&e.event_type)?;
            Some(ValidEvent {
                link_id: e.link_id,
                event_type,
                dwell_time_ms: e.dwell_time_ms,
                swipe_velocity: e.swipe_velocity,
                card_index: e.card_index,
                session_id: e.session_id,
                feed_request_id: e.feed_request_id,
            })
        })
        .collect()
}

fn dwell_interaction_score(dwell_time_ms: i64, swipe_velocity: Option<f64>) -> f64 {
    let dwell_seconds = dwell_time_ms as f64 / 1000.0;
    let dwell_component = (((1.0 + dwell_seconds).ln() / (1.0 + 120.0f64).ln()) * 0.7).min(0.7);
    let velocity_penalty = swipe_velocity
        .map(|v| ((v - 0.5).max(0.0) * 0.1).min(0.2))
        .unwrap_or(0.0);
    clamp01(dwell_component - velocity_penalty)
}

/// Processes one batch of engagement events for `user_id`, atomically.
/// Returns the count of valid (processed) events. Rejects the whole request
/// with `AppError::Validation` if none of the submitted events were valid.
pub async fn ingest(pool: &Pool, user_id: &str, events: Vec<IncomingEvent>, now: DateTime<Utc>) -> Result<usize> {
    let valid = validate(events);
    if valid.is_empty() {
        return Err(AppError::Validation(
            "at least one event with a linkId and a recognized eventType is required".to_string(),
        ));
    }

    let hour_of_day = now.hour() as i16;
    let day_of_week = now.weekday().num_days_from_sunday() as i16;
    let day_type = DayType::from_day_of_week(day_of_week);

    let mut tx = pool.begin().await?;

    for e in &valid {
        db::events::insert(
            &mut tx,
            db::events::NewEvent {
                id: &ids::generate(),
                user_id,
                link_id: &e.link_id,
                event_type: e.event_type,
                dwell_time_ms: e.dwell_time_ms,
                swipe_velocity: e.swipe_velocity,
                card_index: e.card_index,
                hour_of_day,
                day_of_week,
                session_id: e.session_id.as_deref(),
                feed_request_id: e.feed_request_id.as_deref(),
            },
        )
        .await?;
    }

    let mut impression_counts: HashMap<&str, i64> = HashMap::new();
    let mut open_counts: HashMap<&str, i64> = HashMap::new();
    for e in &valid {
        match e.event_type {
            EventType::Impression => *impression_counts.entry(e.link_id.as_str()).or_insert(0) += 1,
            EventType::Open => *open_counts.entry(e.link_id.as_str()).or_insert(0) += 1,
            EventType::Dwell => {}
        }
    }
    for (link_id, count) in &impression_counts {
        db::entries::apply_impressions(&mut tx, user_id, link_id, *count, now).await?;
    }
    for (link_id, count) in &open_counts {
        db::entries::apply_opens(&mut tx, user_id, link_id, *count).await?;
    }

    let dwell_link_ids: Vec<String> = valid
        .iter()
        .filter(|e| matches!(e.event_type, EventType::Dwell) && e.dwell_time_ms.unwrap_or(0) > 0)
        .map(|e| e.link_id.clone())
        .collect();
    let categories_by_link = db::entries::fetch_categories(&mut tx, user_id, &dwell_link_ids).await?;

    let mut category_accum: HashMap<String, (f64, i64)> = HashMap::new();
    for e in &valid {
        if !matches!(e.event_type, EventType::Dwell) {
            continue;
        }
        let Some(dwell_time_ms) = e.dwell_time_ms else {
            continue;
        };
        if dwell_time_ms <= 0 {
            continue;
        }

        let interaction_score = dwell_interaction_score(dwell_time_ms, e.swipe_velocity);
        db::entries::apply_dwell_running_mean(
            &mut tx,
            user_id,
            &e.link_id,
            interaction_score,
            dwell_time_ms as f64,
        )
        .await?;

        if let Some(categories) = categories_by_link.get(&e.link_id) {
            for category in categories {
                let acc = category_accum.entry(category.clone()).or_insert((0.0, 0));
                acc.0 += interaction_score;
                acc.1 += 1;
            }
        }
    }

    for (category, (sum, count)) in &category_accum {
        db::time_prefs::upsert(&mut tx, user_id, hour_of_day, day_type, category, *sum, *count).await?;
    }

    tx.commit().await?;

    Ok(valid.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_events_are_dropped() {
        let events = vec![
            IncomingEvent {
                link_id: "".to_string(),
                event_type: "impression".to_string(),
                dwell_time_ms: None,
                swipe_velocity: None,
                card_index: None,
                session_id: None,
                feed_request_id: None,
            },
            IncomingEvent {
                link_id: "a".to_string(),
                event_type: "bogus".to_string(),
                dwell_time_ms: None,
                swipe_velocity: None,
                card_index: None,
                session_id: None,
                feed_request_id: None,
            },
        ];
        assert!(validate(events).is_empty());
    }

    #[test]
    fn scenario_s6_dwell_interaction_score() {
        let score = dwell_interaction_score(10_000, Some(0.3));
        assert!((score - 0.349).abs() < 0.01, "got {score}");
    }

    #[test]
    fn zero_velocity_penalty_below_threshold() {
        let with_low_velocity = dwell_interaction_score(10_000, Some(0.2));
        let without_velocity = dwell_interaction_score(10_000, None);
        assert!((with_low_velocity - without_velocity).abs() < 1e-9);
    }
}
