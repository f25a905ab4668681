//! Diversity post-pass (spec.md §4.3): reorders a ranked candidate list to
//! avoid three consecutive entries sharing the same primary category,
//! grounded on the look-ahead/`recentPrimaryCats` structure of
//! `ranking-service/src/services/diversity/mod.rs`.

use crate::services::scoring::RankingCandidate;

const LOOKAHEAD_ESCAPE_HATCH: usize = 8;

/// `categories[0]`, or `None` for an uncategorized entry — never completes a
/// triple, since `None != None` is not how equality works here; treat it as
/// always-safe to place.
fn primary_category(candidate: &RankingCandidate) -> Option<&str> {
    candidate.entry.primary_category()
}

fn completes_triple(primary: Option<&str>, recent: &[Option<String>]) -> bool {
    let Some(primary) = primary else {
        return false;
    };
    if recent.len() < 2 {
        return false;
    }
    let last_two = &recent[recent.len() - 2..];
    last_two.iter().all(|c| c.as_deref() == Some(primary))
}

pub fn apply(ranked: Vec<RankingCandidate>) -> Vec<RankingCandidate> {
    let mut remaining = ranked;
    let mut result = Vec::with_capacity(remaining.len());
    let mut recent_primary_cats: Vec<Option<String>> = Vec::new();

    while !remaining.is_empty() {
        let lookahead = remaining.len().min(LOOKAHEAD_ESCAPE_HATCH);
        let all_violate = (0..lookahead)
            .all(|i| completes_triple(primary_category(&remaining[i]), &recent_primary_cats));

        let pick_idx = if all_violate {
            0
        } else {
            (0..remaining.len())
                .find(|&i| !completes_triple(primary_category(&remaining[i]), &recent_primary_cats))
                .unwrap_or(0)
        };

        let picked = remaining.remove(pick_idx);
        recent_primary_cats.push(primary_category(&picked).map(String::from));
        result.push(picked);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, EntryStatus, LibraryEntry};
    use crate::services::scoring::SignalBreakdown;
    use chrono::Utc;
    use std::collections::HashMap;

    fn candidate(id: &str, category: &str, score: f64) -> RankingCandidate {
        RankingCandidate {
            entry: LibraryEntry {
                id: id.to_string(),
                user_id: "u1".to_string(),
                url: None,
                title: None,
                description: None,
                thumbnail: None,
                site_name: None,
                content_type: ContentType::Generic,
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
            },
            base_score: score,
            rerank_score: None,
            final_score: score,
            breakdown: SignalBreakdown::default(),
            features: HashMap::new(),
        }
    }

    #[test]
    fn never_stacks_three_consecutive_same_category_when_alternatives_exist() {
        let ranked = vec![
            candidate("a1", "AI", 0.9),
            candidate("a2", "AI", 0.85),
            candidate("a3", "AI", 0.8),
            candidate("t1", "Tech", 0.7),
        ];
        let out = apply(ranked);
        let cats: Vec<&str> = out
            .iter()
            .map(|c| c.entry.primary_category().unwrap())
            .collect();
        for window in cats.windows(3) {
            assert!(!(window[0] == window[1] && window[1] == window[2]));
        }
    }

    #[test]
    fn accepts_triple_when_all_remaining_are_the_same_category() {
        let ranked = vec![
            candidate("a1", "AI", 0.9),
            candidate("a2", "AI", 0.85),
            candidate("a3", "AI", 0.8),
            candidate("a4", "AI", 0.75),
        ];
        let out = apply(ranked);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].entry.id, "a1");
        assert_eq!(out[3].entry.id, "a4");
    }

    #[test]
    fn preserves_full_set() {
        let ranked = vec![
            candidate("a", "AI", 0.9),
            candidate("b", "Tech", 0.8),
            candidate("c", "AI", 0.7),
        ];
        let mut ids: Vec<String> = apply(ranked).into_iter().map(|c| c.entry.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
