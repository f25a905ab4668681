use chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::collections::HashMap;
use tracing::error;

use crate::db::Pool;
use crate::error::{AppError, Result};
use crate::models::{ContentType, EntryStatus, LibraryEntry};

type Row = (
    String,                 // id
    String,                 // user_id
    Option<String>,         // url
    Option<String>,         // title
    Option<String>,         // description
    Option<String>,         // thumbnail
    Option<String>,         // site_name
    String,                 // content_type
    Option<String>,         // text_content
    Option<String>,         // image_data
    Json<Vec<String>>,      // categories
    Option<String>,         // ai_summary
    Json<serde_json::Value>,// metadata
    Option<Json<Vec<f32>>>, // embedding
    String,                 // status
    DateTime<Utc>,          // added_at
    Option<DateTime<Utc>>,  // archived_at
    Option<DateTime<Utc>>,  // last_shown_at
    i64,                    // shown_count
    f64,                    // engagement_score
    f64,                    // avg_dwell_ms
    i64,                    // open_count
    Option<DateTime<Utc>>,  // liked_at
);

const SELECT_COLUMNS: &str = r#"
    id, user_id, url, title, description, thumbnail, site_name, content_type,
    text_content, image_data, categories, ai_summary, metadata, embedding,
    status, added_at, archived_at, last_shown_at, shown_count,
    engagement_score, avg_dwell_ms, open_count, liked_at
"#;

fn content_type_from_str(s: &str) -> ContentType {
    match s {
        "youtube" => ContentType::Youtube,
        "tweet" => ContentType::Tweet,
        "article" => ContentType::Article,
        "instagram" => ContentType::Instagram,
        "image" => ContentType::Image,
        "text" => ContentType::Text,
        _ => ContentType::Generic,
    }
}

pub fn content_type_as_str(ct: &ContentType) -> &'static str {
    match ct {
        ContentType::Youtube => "youtube",
        ContentType::Tweet => "tweet",
        ContentType::Article => "article",
        ContentType::Instagram => "instagram",
        ContentType::Image => "image",
        ContentType::Text => "text",
        ContentType::Generic => "generic",
    }
}

fn row_to_entry(r: Row) -> LibraryEntry {
    LibraryEntry {
        id: r.0,
        user_id: r.1,
        url: r.2,
        title: r.3,
        description: r.4,
        thumbnail: r.5,
        site_name: r.6,
        content_type: content_type_from_str(&r.7),
        text_content: r.8,
        image_data: r.9,
        categories: r.10 .0,
        ai_summary: r.11,
        metadata: r.12 .0,
        embedding: r.13.map(|j| j.0),
        status: if r.14 == "archived" {
            EntryStatus::Archived
        } else {
            EntryStatus::Active
        },
        added_at: r.15,
        archived_at: r.16,
        last_shown_at: r.17,
        shown_count: r.18,
        engagement_score: r.19,
        avg_dwell_ms: r.20,
        open_count: r.21,
        liked_at: r.22,
    }
}

pub struct NewEntry<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub url: Option<&'a str>,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub thumbnail: Option<&'a str>,
    pub site_name: Option<&'a str>,
    pub content_type: &'a ContentType,
    pub text_content: Option<&'a str>,
    pub image_data: Option<&'a str>,
    pub categories: &'a [String],
    pub ai_summary: Option<&'a str>,
    pub metadata: &'a serde_json::Value,
    pub embedding: Option<&'a [f32]>,
}

pub async fn insert(pool: &Pool, new: NewEntry<'_>) -> Result<LibraryEntry> {
    let row = sqlx::query_as::<_, Row>(&format!(
        r#"
        INSERT INTO library_entries (
            id, user_id, url, title, description, thumbnail, site_name,
            content_type, text_content, image_data, categories, ai_summary,
            metadata, embedding, status
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'active'
        )
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(new.id)
    .bind(new.user_id)
    .bind(new.url)
    .bind(new.title)
    .bind(new.description)
    .bind(new.thumbnail)
    .bind(new.site_name)
    .bind(content_type_as_str(new.content_type))
    .bind(new.text_content)
    .bind(new.image_data)
    .bind(Json(new.categories.to_vec()))
    .bind(new.ai_summary)
    .bind(Json(new.metadata.clone()))
    .bind(new.embedding.map(|e| Json(e.to_vec())))
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            AppError::conflict("duplicate url for this user")
        } else {
            error!("failed to insert library entry: {}", e);
            AppError::from(e)
        }
    })?;

    Ok(row_to_entry(row))
}

pub async fn find_by_user_and_url(
    pool: &Pool,
    user_id: &str,
    url: &str,
) -> Result<Option<LibraryEntry>> {
    let row = sqlx::query_as::<_, Row>(&format!(
        "SELECT {SELECT_COLUMNS} FROM library_entries WHERE user_id = $1 AND url = $2"
    ))
    .bind(user_id)
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_entry))
}

pub async fn list_by_status(
    pool: &Pool,
    user_id: &str,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<LibraryEntry>> {
    let rows = sqlx::query_as::<_, Row>(&format!(
        r#"
        SELECT {SELECT_COLUMNS} FROM library_entries
        WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
        ORDER BY added_at DESC
        LIMIT $3
        "#
    ))
    .bind(user_id)
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_entry).collect())
}

pub struct Stats {
    pub active: i64,
    pub archived: i64,
    pub total: i64,
    pub categories: Vec<String>,
}

pub async fn stats(pool: &Pool, user_id: &str) -> Result<Stats> {
    let (active, archived): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status = 'active'),
            COUNT(*) FILTER (WHERE status = 'archived')
        FROM library_entries WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let category_rows: Vec<(Json<Vec<String>>,)> =
        sqlx::query_as("SELECT DISTINCT categories FROM library_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    let mut categories: Vec<String> = category_rows
        .into_iter()
        .flat_map(|(c,)| c.0)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    categories.sort();

    Ok(Stats {
        active,
        archived,
        total: active + archived,
        categories,
    })
}

/// Candidates for one feed request: active, owned by `user_id`, optionally
/// restricted to a category, minus `exclude_ids` (spec.md §4.7 steps 1-2).
pub async fn list_candidates(
    pool: &Pool,
    user_id: &str,
    category: Option<&str>,
    exclude_ids: &[String],
) -> Result<Vec<LibraryEntry>> {
    let rows = sqlx::query_as::<_, Row>(&format!(
        r#"
        SELECT {SELECT_COLUMNS} FROM library_entries
        WHERE user_id = $1
          AND status = 'active'
          AND ($2::TEXT IS NULL OR categories @> to_jsonb($2::TEXT))
          AND NOT (id = ANY($3))
        "#
    ))
    .bind(user_id)
    .bind(category)
    .bind(exclude_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_entry).collect())
}

/// Embeddings for the session's recent engaged ids (spec.md §4.7: "most
/// recent 48 `engagedIds`").
/// Distinct categories across every active entry for `user_id`, used to
/// build the feed's category tab list (spec.md §4.7 step 1 "fetch
/// categories-only rows for the tab list"). A lighter query than
/// `list_candidates` since it never touches `embedding`/`metadata`.
pub async fn list_active_categories(pool: &Pool, user_id: &str) -> Result<Vec<String>> {
    let rows: Vec<(Json<Vec<String>>,)> = sqlx::query_as(
        "SELECT categories FROM library_entries WHERE user_id = $1 AND status = 'active'",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut categories: Vec<String> = rows
        .into_iter()
        .flat_map(|(c,)| c.0)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    categories.sort();
    Ok(categories)
}

pub async fn fetch_embeddings(
    pool: &Pool,
    user_id: &str,
    ids: &[String],
) -> Result<HashMap<String, Vec<f32>>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(String, Option<Json<Vec<f32>>>)> = sqlx::query_as(
        r#"
        SELECT id, embedding FROM library_entries
        WHERE user_id = $1 AND id = ANY($2) AND embedding IS NOT NULL
        "#,
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, e)| e.map(|e| (id, e.0)))
        .collect())
}

/// Categories for a set of entries, read inside the same transaction that
/// will update them (spec.md §4.4 step 4: category accumulation needs each
/// dwelled entry's categories).
pub async fn fetch_categories(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    ids: &[String],
) -> Result<HashMap<String, Vec<String>>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(String, Json<Vec<String>>)> = sqlx::query_as(
        "SELECT id, categories FROM library_entries WHERE user_id = $1 AND id = ANY($2)",
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(|(id, c)| (id, c.0)).collect())
}

pub struct Patch {
    pub status: Option<EntryStatus>,
    pub shown_count: Option<i64>,
    pub increment_shown: Option<i64>,
    pub liked: Option<bool>,
}

pub async fn patch(
    pool: &Pool,
    user_id: &str,
    id: &str,
    p: Patch,
) -> Result<Option<LibraryEntry>> {
    let status_str = p.status.map(|s| match s {
        EntryStatus::Active => "active",
        EntryStatus::Archived => "archived",
    });

    let row = sqlx::query_as::<_, Row>(&format!(
        r#"
        UPDATE library_entries SET
            status = COALESCE($3, status),
            archived_at = CASE WHEN $3 = 'archived' THEN now() ELSE archived_at END,
            shown_count = CASE
                WHEN $4::BIGINT IS NOT NULL THEN $4
                WHEN $5::BIGINT IS NOT NULL THEN shown_count + $5
                ELSE shown_count
            END,
            liked_at = CASE
                WHEN $6::BOOLEAN = TRUE THEN now()
                WHEN $6::BOOLEAN = FALSE THEN NULL
                ELSE liked_at
            END
        WHERE user_id = $1 AND id = $2
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(id)
    .bind(status_str)
    .bind(p.shown_count)
    .bind(p.increment_shown)
    .bind(p.liked)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_entry))
}

pub async fn delete(pool: &Pool, user_id: &str, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM library_entries WHERE user_id = $1 AND id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Impression-side counters: `shown_count += count`, `last_shown_at = now`
/// (spec.md §4.4 step 2). Driven only by engagement ingestion; scoped by
/// `user_id` so a `link_id` from another user's library is a no-op rather
/// than a cross-user write (spec.md §5, §7).
pub async fn apply_impressions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    link_id: &str,
    count: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE library_entries SET shown_count = shown_count + $3, last_shown_at = $4 WHERE user_id = $1 AND id = $2",
    )
    .bind(user_id)
    .bind(link_id)
    .bind(count)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Open counters: `open_count += count` (spec.md §4.4 step 3), scoped by
/// `user_id` (spec.md §5, §7).
pub async fn apply_opens(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    link_id: &str,
    count: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE library_entries SET open_count = open_count + $3 WHERE user_id = $1 AND id = $2",
    )
    .bind(user_id)
    .bind(link_id)
    .bind(count)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Running-mean update to `engagement_score` / `avg_dwell_ms`, evaluated
/// server-side against the *current* `shown_count` so concurrent updates on
/// the same entry never overwrite each other (spec.md §4.4 step 4c, §5).
/// Scoped by `user_id` (spec.md §5, §7).
pub async fn apply_dwell_running_mean(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    link_id: &str,
    interaction_score: f64,
    dwell_time_ms: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE library_entries SET
            engagement_score = LEAST(1.0, GREATEST(0.0, CASE
                WHEN shown_count <= 1 THEN $3
                ELSE (engagement_score * (shown_count - 1) + $3) / shown_count
            END)),
            avg_dwell_ms = CASE
                WHEN shown_count <= 1 THEN $4
                ELSE (avg_dwell_ms * (shown_count - 1) + $4) / shown_count
            END
        WHERE user_id = $1 AND id = $2
        "#,
    )
    .bind(user_id)
    .bind(link_id)
    .bind(interaction_score)
    .bind(dwell_time_ms)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn begin(pool: &Pool) -> Result<sqlx::Transaction<'_, sqlx::Postgres>> {
    Ok(pool.begin().await?)
}

/// The handful of entry fields the training-dataset exporter needs per
/// candidate link (spec.md §4.8 output keys `content_type`, `categories`,
/// `liked`, `avg_dwell_ms`), keyed by entry id.
pub struct ExportFields {
    pub content_type: ContentType,
    pub categories: Vec<String>,
    pub liked: bool,
    pub avg_dwell_ms: f64,
}

pub async fn fetch_export_fields(
    pool: &Pool,
    user_id: &str,
    ids: &[String],
) -> Result<HashMap<String, ExportFields>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(String, String, Json<Vec<String>>, Option<DateTime<Utc>>, f64)> = sqlx::query_as(
        r#"
        SELECT id, content_type, categories, liked_at, avg_dwell_ms
        FROM library_entries WHERE user_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, ct, cats, liked_at, avg_dwell_ms)| {
            (
                id,
                ExportFields {
                    content_type: content_type_from_str(&ct),
                    categories: cats.0,
                    liked: liked_at.is_some(),
                    avg_dwell_ms,
                },
            )
        })
        .collect())
}
