//! Content ingestor (spec.md §4.5): URL unfurling, text/image ingest, and
//! duplicate detection. Orchestrates `ssrf` (trust boundary), `meta` (HTML
//! extraction), and `categorize` (categorization/embedding seams).

pub mod categorize;
pub mod meta;
pub mod ssrf;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::db;
use crate::db::Pool;
use crate::error::{AppError, Result};
use crate::ids;
use crate::models::{ContentType, LibraryEntry};

use categorize::{Categorizer, EmbeddingModel};

const YOUTUBE_OEMBED_TIMEOUT: Duration = Duration::from_secs(5);
const GENERIC_FETCH_TIMEOUT: Duration = Duration::from_secs(8);
const MAX_FETCH_BYTES: usize = 750_000;
const BULK_BATCH_CAP: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnfurlResult {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub site_name: Option<String>,
    pub content_type: ContentType,
    #[serde(rename = "fallbackResult")]
    pub fallback_result: bool,
}

fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or("").to_ascii_lowercase()
}

fn detect_content_type(host: &str) -> ContentType {
    if host == "youtube.com" || host == "www.youtube.com" || host == "youtu.be" {
        ContentType::Youtube
    } else if host == "twitter.com" || host == "www.twitter.com" || host == "x.com" || host == "www.x.com" {
        ContentType::Tweet
    } else if host == "instagram.com" || host == "www.instagram.com" {
        ContentType::Instagram
    } else {
        ContentType::Article
    }
}

/// 11-character YouTube video id from a `youtube.com/watch?v=`, `youtu.be/`,
/// or `youtube.com/shorts/` URL (spec.md §4.5 step 2).
fn extract_youtube_video_id(url: &Url) -> Option<String> {
    let host = host_of(url);
    if host == "youtu.be" {
        let id = url.path().trim_start_matches('/');
        return is_valid_video_id(id).then(|| id.to_string());
    }
    if host == "youtube.com" || host == "www.youtube.com" {
        if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
            if is_valid_video_id(&v) {
                return Some(v.to_string());
            }
        }
        for prefix in ["/shorts/", "/embed/"] {
            if let Some(id) = url.path().strip_prefix(prefix) {
                if is_valid_video_id(id) {
                    return Some(id.to_string());
                }
            }
        }
    }
    None
}

fn is_valid_video_id(id: &str) -> bool {
    id.len() == 11 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    #[serde(rename = "author_name")]
    author_name: Option<String>,
}

async fn fetch_youtube_oembed(video_id: &str) -> Option<(String, Option<String>)> {
    let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
    let oembed_url = format!("https://www.youtube.com/oembed?url={}&format=json", urlencoding::encode(&watch_url));

    let client = reqwest::Client::builder()
        .timeout(YOUTUBE_OEMBED_TIMEOUT)
        .build()
        .ok()?;
    let response = client.get(&oembed_url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let body: OEmbedResponse = response.json().await.ok()?;
    body.title.map(|t| (t, body.author_name))
}

fn youtube_thumbnail(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg")
}

/// Unfurls a single URL into metadata, with the YouTube oEmbed fast path and
/// a generic-fetch fallback (spec.md §4.5 steps 1-5).
pub async fn unfurl(url_str: &str) -> Result<UnfurlResult> {
    let url = Url::parse(url_str).map_err(|_| AppError::Validation("invalid url".to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::Validation("url must be http or https".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(AppError::Validation("url must not contain credentials".to_string()));
    }

    let host = host_of(&url);
    let content_type = detect_content_type(&host);

    if let ContentType::Youtube = content_type {
        if let Some(video_id) = extract_youtube_video_id(&url) {
            if let Some((title, author)) = fetch_youtube_oembed(&video_id).await {
                return Ok(UnfurlResult {
                    url: url_str.to_string(),
                    title: Some(title),
                    description: author,
                    thumbnail: Some(youtube_thumbnail(&video_id)),
                    site_name: Some("YouTube".to_string()),
                    content_type,
                    fallback_result: false,
                });
            }
        }
    }

    match generic_unfurl(&url, content_type.clone()).await {
        Ok(result) => Ok(result),
        Err(e) if matches!(e, AppError::UnsafeTarget(_)) => Err(e),
        Err(e) => {
            warn!("unfurl fallback for {}: {}", url_str, e);
            Ok(UnfurlResult {
                url: url_str.to_string(),
                title: None,
                description: None,
                thumbnail: None,
                site_name: None,
                content_type,
                fallback_result: true,
            })
        }
    }
}

async fn generic_unfurl(url: &Url, content_type: ContentType) -> Result<UnfurlResult> {
    let fetched = ssrf::fetch(url.as_str(), GENERIC_FETCH_TIMEOUT, MAX_FETCH_BYTES).await?;

    let is_html = fetched
        .content_type
        .as_deref()
        .map(|ct| ct.starts_with("text/html") || ct.starts_with("application/xhtml"))
        .unwrap_or(false);
    if !is_html {
        return Err(AppError::ExternalFailure("response was not html".to_string()));
    }

    let html = String::from_utf8_lossy(&fetched.bytes);
    let extracted = meta::extract(&html);

    Ok(UnfurlResult {
        url: url.to_string(),
        title: extracted.title,
        description: extracted.description,
        thumbnail: extracted.thumbnail,
        site_name: extracted.site_name,
        content_type,
        fallback_result: false,
    })
}

pub struct IngestService {
    categorizer: Arc<dyn Categorizer>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl IngestService {
    pub fn new(categorizer: Arc<dyn Categorizer>, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self { categorizer, embedder }
    }

    pub fn with_defaults() -> Self {
        Self::new(Arc::new(categorize::KeywordCategorizer), Arc::new(categorize::HashEmbeddingModel))
    }

    /// Ingests a URL: unfurl, categorize, embed, persist (spec.md §4.5
    /// steps 1-8). Returns `AppError::Conflict` carrying the existing row
    /// when `(userId, url)` already exists.
    pub async fn ingest_url(&self, pool: &Pool, user_id: &str, url: &str) -> Result<LibraryEntry> {
        if let Some(existing) = db::entries::find_by_user_and_url(pool, user_id, url).await? {
            return Err(AppError::conflict_with(
                "link already exists",
                serde_json::to_value(&existing).unwrap_or(serde_json::Value::Null),
            ));
        }

        let unfurled = unfurl(url).await?;

        let categorize_text = format!(
            "{} {}",
            unfurled.title.as_deref().unwrap_or(""),
            unfurled.description.as_deref().unwrap_or("")
        );
        let categories = self.categorizer.categorize(&categorize_text).await;

        let embed_text = format!(
            "{} {} {} {}",
            unfurled.title.as_deref().unwrap_or(""),
            unfurled.description.as_deref().unwrap_or(""),
            categories.join(" "),
            unfurled.site_name.as_deref().unwrap_or("")
        );
        let embedding = self.embedder.embed(&embed_text).await;

        let id = ids::generate();
        let metadata = serde_json::json!({});

        db::entries::insert(
            pool,
            db::entries::NewEntry {
                id: &id,
                user_id,
                url: Some(url),
                title: unfurled.title.as_deref(),
                description: unfurled.description.as_deref(),
                thumbnail: unfurled.thumbnail.as_deref(),
                site_name: unfurled.site_name.as_deref(),
                content_type: &unfurled.content_type,
                text_content: None,
                image_data: None,
                categories: &categories,
                ai_summary: None,
                metadata: &metadata,
                embedding: embedding.as_deref(),
            },
        )
        .await
    }

    pub async fn ingest_text(&self, pool: &Pool, user_id: &str, title: Option<&str>, text_content: &str) -> Result<LibraryEntry> {
        if text_content.trim().is_empty() {
            return Err(AppError::Validation("textContent is required".to_string()));
        }

        let categorize_text = format!("{} {}", title.unwrap_or(""), text_content);
        let categories = self.categorizer.categorize(&categorize_text).await;
        let embedding = self.embedder.embed(&categorize_text).await;

        let id = ids::generate();
        let metadata = serde_json::json!({});

        db::entries::insert(
            pool,
            db::entries::NewEntry {
                id: &id,
                user_id,
                url: None,
                title,
                description: None,
                thumbnail: None,
                site_name: None,
                content_type: &ContentType::Text,
                text_content: Some(text_content),
                image_data: None,
                categories: &categories,
                ai_summary: None,
                metadata: &metadata,
                embedding: embedding.as_deref(),
            },
        )
        .await
    }

    pub async fn ingest_image(&self, pool: &Pool, user_id: &str, title: Option<&str>, image_data: &str) -> Result<LibraryEntry> {
        if image_data.trim().is_empty() {
            return Err(AppError::Validation("imageData is required".to_string()));
        }

        let categorize_text = title.unwrap_or("");
        let categories = self.categorizer.categorize(categorize_text).await;
        let embedding = self.embedder.embed(categorize_text).await;

        let id = ids::generate();
        let metadata = serde_json::json!({});

        db::entries::insert(
            pool,
            db::entries::NewEntry {
                id: &id,
                user_id,
                url: None,
                title,
                description: None,
                thumbnail: None,
                site_name: None,
                content_type: &ContentType::Image,
                text_content: None,
                image_data: Some(image_data),
                categories: &categories,
                ai_summary: None,
                metadata: &metadata,
                embedding: embedding.as_deref(),
            },
        )
        .await
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResultItem {
    pub url: String,
    pub status: BulkStatus,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    Added,
    Duplicate,
    Error,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct BulkSummary {
    pub added: usize,
    pub duplicates: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub results: Vec<BulkResultItem>,
    pub summary: BulkSummary,
}

impl IngestService {
    /// Bulk URL ingest, capped at 50 per batch (spec.md §6 `PUT /upload`).
    pub async fn ingest_bulk(&self, pool: &Pool, user_id: &str, urls: Vec<String>) -> Result<BulkResult> {
        if urls.len() > BULK_BATCH_CAP {
            return Err(AppError::Validation(format!(
                "at most {BULK_BATCH_CAP} urls per batch"
            )));
        }

        let mut results = Vec::with_capacity(urls.len());
        let mut summary = BulkSummary::default();

        for url in urls {
            match self.ingest_url(pool, user_id, &url).await {
                Ok(_) => {
                    summary.added += 1;
                    results.push(BulkResultItem {
                        url,
                        status: BulkStatus::Added,
                    });
                }
                Err(AppError::Conflict(_, _)) => {
                    summary.duplicates += 1;
                    results.push(BulkResultItem {
                        url,
                        status: BulkStatus::Duplicate,
                    });
                }
                Err(e) => {
                    warn!("bulk ingest failed for {}: {}", url, e);
                    summary.errors += 1;
                    results.push(BulkResultItem {
                        url,
                        status: BulkStatus::Error,
                    });
                }
            }
        }

        Ok(BulkResult { results, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_content_type_by_host() {
        assert_eq!(detect_content_type("www.youtube.com"), ContentType::Youtube);
        assert_eq!(detect_content_type("x.com"), ContentType::Tweet);
        assert_eq!(detect_content_type("instagram.com"), ContentType::Instagram);
        assert_eq!(detect_content_type("example.com"), ContentType::Article);
    }

    #[test]
    fn extracts_youtube_video_id_from_watch_url() {
        let url = Url::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(extract_youtube_video_id(&url), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn extracts_youtube_video_id_from_short_url() {
        let url = Url::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(extract_youtube_video_id(&url), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn rejects_malformed_video_ids() {
        let url = Url::parse("https://youtu.be/short").unwrap();
        assert_eq!(extract_youtube_video_id(&url), None);
    }
}
