//! Domain entities (spec.md §3), shaped like `feed-service/src/models/mod.rs`
//! and `content-service/src/models/mod.rs`: plain `Serialize`/`Deserialize`
//! structs that double as `sqlx::FromRow` rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CATEGORY_VOCABULARY: &[&str] = &[
    "Tech",
    "AI",
    "Music",
    "Science",
    "Business",
    "Design",
    "Fun",
    "News",
    "Health",
    "Sports",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Youtube,
    Tweet,
    Article,
    Instagram,
    Image,
    Text,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Impression,
    Dwell,
    Open,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Impression => "impression",
            EventType::Dwell => "dwell",
            EventType::Open => "open",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "impression" => Some(EventType::Impression),
            "dwell" => Some(EventType::Dwell),
            "open" => Some(EventType::Open),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn from_day_of_week(day_of_week: i16) -> Self {
        if day_of_week == 0 || day_of_week == 6 {
            DayType::Weekend
        } else {
            DayType::Weekday
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        PublicUser {
            id: u.id.clone(),
            email: u.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    pub user_id: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub site_name: Option<String>,
    pub content_type: ContentType,
    pub text_content: Option<String>,
    pub image_data: Option<String>,
    pub categories: Vec<String>,
    pub ai_summary: Option<String>,
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub status: EntryStatus,
    pub added_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub shown_count: i64,
    pub engagement_score: f64,
    pub avg_dwell_ms: f64,
    pub open_count: i64,
    pub liked_at: Option<DateTime<Utc>>,
}

impl LibraryEntry {
    /// Primary category used by the diversity pass (GLOSSARY).
    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(|s| s.as_str())
    }

    /// Strip the embedding for response serialization (spec.md §4.7 step 7).
    pub fn without_embedding(mut self) -> Self {
        self.embedding = None;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub id: String,
    pub user_id: String,
    pub link_id: String,
    pub event_type: EventType,
    pub dwell_time_ms: Option<i64>,
    pub swipe_velocity: Option<f64>,
    pub card_index: Option<i32>,
    pub hour_of_day: i16,
    pub day_of_week: i16,
    pub session_id: Option<String>,
    pub feed_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimePreference {
    pub user_id: String,
    pub hour_slot: i16,
    pub day_type: DayType,
    pub category: String,
    pub avg_engagement: f64,
    pub sample_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEvent {
    pub feed_request_id: String,
    pub link_id: String,
    pub candidate_rank: i64,
    pub served_rank: Option<i64>,
    pub base_score: f64,
    pub rerank_score: Option<f64>,
    pub final_score: f64,
    pub features: HashMap<String, f64>,
    pub algorithm_version: String,
    pub reranker_version: Option<String>,
    pub active_category: String,
    pub cards_shown: i64,
    pub created_at: DateTime<Utc>,
}

pub const ALGORITHM_VERSION: &str = "v1";
