//! End-to-end exercise of the score → rerank → diversify pipeline through
//! `driftfeed`'s public `services` surface, grounded on
//! `ranking-service/tests/integration_test.rs`'s pattern of driving exported
//! layers directly rather than spinning up the HTTP server. No database is
//! needed here since `scoring`/`reranker`/`diversity` are pure over owned
//! `Vec`s.

use std::collections::HashMap;

use chrono::Utc;

use driftfeed::models::{ContentType, EntryStatus, LibraryEntry};
use driftfeed::services::{diversity, reranker, scoring};

fn entry(id: &str, category: &str) -> LibraryEntry {
    LibraryEntry {
        id: id.to_string(),
        user_id: "u1".to_string(),
        url: Some(format!("https://example.com/{id}")),
        title: Some(format!("entry {id}")),
        description: None,
        thumbnail: None,
        site_name: None,
        content_type: ContentType::Article,
        text_content: None,
        image_data: None,
        categories: vec![category.to_string()],
        ai_summary: None,
        metadata: serde_json::json!({}),
        embedding: None,
        status: EntryStatus::Active,
        added_at: Utc::now(),
        archived_at: None,
        last_shown_at: None,
        shown_count: 0,
        engagement_score: 0.0,
        avg_dwell_ms: 0.0,
        open_count: 0,
        liked_at: None,
    }
}

#[test]
fn pipeline_never_places_three_same_category_entries_in_a_row() {
    let candidates: Vec<LibraryEntry> = (0..9)
        .map(|i| {
            let category = if i % 2 == 0 { "Tech" } else { "Cooking" };
            entry(&format!("e{i}"), category)
        })
        .collect();

    let session = scoring::SessionContext::new(Vec::new(), Vec::new(), Vec::new(), Vec::new(), 0);
    let scored = scoring::score(candidates, &session, &[], Utc::now());
    let rerank_outcome = reranker::apply(scored, false, "models/xgboost-reranker.json");
    assert!(!rerank_outcome.applied, "reranker is disabled in this scenario");

    let diversified = diversity::apply(rerank_outcome.candidates);

    let primary_cats: Vec<Option<String>> = diversified
        .iter()
        .map(|c| c.entry.primary_category().map(str::to_string))
        .collect();

    for window in primary_cats.windows(3) {
        assert!(
            !(window[0] == window[1] && window[1] == window[2]),
            "three consecutive entries shared the same primary category: {window:?}"
        );
    }
}

#[test]
fn cold_start_candidates_all_score_above_zero() {
    let candidates = vec![entry("a", "Tech"), entry("b", "Tech"), entry("c", "News")];
    let session = scoring::SessionContext::new(Vec::new(), Vec::new(), Vec::new(), Vec::new(), 0);
    let scored = scoring::score(candidates, &session, &[], Utc::now());

    assert_eq!(scored.len(), 3);
    for candidate in &scored {
        assert!(candidate.final_score >= 0.0, "scores should never go negative: {candidate:?}");
    }
}
