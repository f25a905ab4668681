use chrono::{DateTime, Utc};

use crate::db::Pool;
use crate::error::Result;
use crate::models::{EngagementEvent, EventType};

pub struct NewEvent<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub link_id: &'a str,
    pub event_type: EventType,
    pub dwell_time_ms: Option<i64>,
    pub swipe_velocity: Option<f64>,
    pub card_index: Option<i32>,
    pub hour_of_day: i16,
    pub day_of_week: i16,
    pub session_id: Option<&'a str>,
    pub feed_request_id: Option<&'a str>,
}

pub async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    e: NewEvent<'_>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO engagement_events (
            id, user_id, link_id, event_type, dwell_time_ms, swipe_velocity,
            card_index, hour_of_day, day_of_week, session_id, feed_request_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(e.id)
    .bind(e.user_id)
    .bind(e.link_id)
    .bind(e.event_type.as_str())
    .bind(e.dwell_time_ms)
    .bind(e.swipe_velocity)
    .bind(e.card_index)
    .bind(e.hour_of_day)
    .bind(e.day_of_week)
    .bind(e.session_id)
    .bind(e.feed_request_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Events for a user within a window, used by the training-dataset exporter
/// to join ranking events against their engagement outcomes (spec.md §4.8).
pub async fn list_for_user_since(
    pool: &Pool,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<EngagementEvent>> {
    let rows: Vec<(
        String,
        String,
        String,
        String,
        Option<i64>,
        Option<f64>,
        Option<i32>,
        i16,
        i16,
        Option<String>,
        Option<String>,
        DateTime<Utc>,
    )> = sqlx::query_as(
        r#"
        SELECT id, user_id, link_id, event_type, dwell_time_ms, swipe_velocity,
               card_index, hour_of_day, day_of_week, session_id, feed_request_id, created_at
        FROM engagement_events
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
        .filter_map(|r| {
            Some(EngagementEvent {
                id: r.0,
                user_id: r.1,
                link_id: r.2,
                event_type: EventType::parse(&r.3)?,
                dwell_time_ms: r.4,
                swipe_velocity: r.5,
                card_index: r.6,
                hour_of_day: r.7,
                day_of_week: r.8,
                session_id: r.9,
                feed_request_id: r.10,
                created_at: r.11,
            })
        })
        .collect())
}
