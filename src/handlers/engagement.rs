//! `POST /engagement` (spec.md §6): accepts either a batch `{events:[...]}`
//! or a single event object, matching the client's interval-flush batching
//! (spec.md §5 "Backpressure").

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::handlers::AppState;
use crate::services::engagement::{self, IncomingEvent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub link_id: String,
    pub event_type: String,
    pub dwell_time_ms: Option<i64>,
    pub swipe_velocity: Option<f64>,
    pub card_index: Option<i32>,
    pub session_id: Option<String>,
    pub feed_request_id: Option<String>,
}

impl From<EventDto> for IncomingEvent {
    fn from(e: EventDto) -> Self {
        IncomingEvent {
            link_id: e.link_id,
            event_type: e.event_type,
            dwell_time_ms: e.dwell_time_ms,
            swipe_velocity: e.swipe_velocity,
            card_index: e.card_index,
            session_id: e.session_id,
            feed_request_id: e.feed_request_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EngagementBody {
    Batch { events: Vec<EventDto> },
    Single(EventDto),
}

pub async fn ingest(state: web::Data<AppState>, user: CurrentUser, body: web::Json<EngagementBody>) -> Result<HttpResponse> {
    let events: Vec<IncomingEvent> = match body.into_inner() {
        EngagementBody::Batch { events } => events.into_iter().map(Into::into).collect(),
        EngagementBody::Single(e) => vec![e.into()],
    };

    let processed = engagement::ingest(&state.pool, &user.id, events, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "processed": processed,
    })))
}
