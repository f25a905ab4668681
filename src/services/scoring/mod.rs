//! Scoring core (spec.md §4.1): turns candidates, a session context, and the
//! caller's time preferences into an ordered list of `RankingCandidate`s.
//!
//! Grounded on the shape of `ranking-service/src/services/ranking/scorer.rs`
//! (a `Scorer` type over pre-fetched feature inputs, producing a sorted,
//! feature-annotated candidate list) and `exploration/ucb.rs` for the UCB
//! exploration term. The six independent signal formulas live in
//! `signals.rs`; weight derivation lives in `weights.rs`.

pub mod signals;
pub mod weights;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{ContentType, LibraryEntry, TimePreference};

const MAX_SESSION_HISTORY: usize = 200;
const MAX_SEMANTIC_EMBEDDINGS: usize = 48;

/// Short-lived, per-request signal bundle summarizing the current browsing
/// session (GLOSSARY "Session context"). Oldest-to-newest ordering is
/// preserved; construction truncates to the most recent entries so a
/// pathologically long client-supplied history can't blow up scoring cost.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub engaged_link_ids: Vec<String>,
    pub engaged_categories: Vec<String>,
    pub skipped_categories: Vec<String>,
    pub engaged_embeddings: Vec<Vec<f32>>,
    pub cards_shown: i64,
}

impl SessionContext {
    pub fn new(
        mut engaged_link_ids: Vec<String>,
        mut engaged_categories: Vec<String>,
        mut skipped_categories: Vec<String>,
        mut engaged_embeddings: Vec<Vec<f32>>,
        cards_shown: i64,
    ) -> Self {
        truncate_recent(&mut engaged_link_ids, MAX_SESSION_HISTORY);
        truncate_recent(&mut engaged_categories, MAX_SESSION_HISTORY);
        truncate_recent(&mut skipped_categories, MAX_SESSION_HISTORY);
        truncate_recent(&mut engaged_embeddings, MAX_SEMANTIC_EMBEDDINGS);
        Self {
            engaged_link_ids,
            engaged_categories,
            skipped_categories,
            engaged_embeddings,
            cards_shown,
        }
    }
}

fn truncate_recent<T>(v: &mut Vec<T>, cap: usize) {
    if v.len() > cap {
        let drop = v.len() - cap;
        v.drain(0..drop);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalBreakdown {
    pub engagement: f64,
    pub semantic: f64,
    pub session: f64,
    pub time_pref: f64,
    pub freshness: f64,
    pub exploration: f64,
}

#[derive(Debug, Clone)]
pub struct RankingCandidate {
    pub entry: LibraryEntry,
    pub base_score: f64,
    pub rerank_score: Option<f64>,
    pub final_score: f64,
    pub breakdown: SignalBreakdown,
    pub features: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
struct CategoryBandit {
    shown: i64,
    engagement_sum: f64,
}

#[derive(Debug, Clone)]
struct DatasetStats {
    total_shown: i64,
    global_engagement_mean: f64,
    content_type_means: HashMap<ContentType, f64>,
    category_bandits: HashMap<String, CategoryBandit>,
}

fn compute_dataset_stats(candidates: &[LibraryEntry]) -> DatasetStats {
    let total_shown: i64 = candidates
        .iter()
        .filter(|e| e.shown_count > 0)
        .map(|e| e.shown_count)
        .sum();

    let global_engagement_mean = if total_shown > 0 {
        candidates
            .iter()
            .filter(|e| e.shown_count > 0)
            .map(|e| signals::clamp01(e.engagement_score) * e.shown_count as f64)
            .sum::<f64>()
            / total_shown as f64
    } else {
        0.5
    };

    let mut type_sums: HashMap<ContentType, (f64, i64)> = HashMap::new();
    for e in candidates {
        if e.shown_count > 0 {
            let acc = type_sums.entry(e.content_type.clone()).or_insert((0.0, 0));
            acc.0 += signals::clamp01(e.engagement_score) * e.shown_count as f64;
            acc.1 += e.shown_count;
        }
    }
    let content_type_means = type_sums
        .into_iter()
        .map(|(ct, (sum, shown))| {
            let mean = if shown > 0 {
                sum / shown as f64
            } else {
                global_engagement_mean
            };
            (ct, mean)
        })
        .collect();

    let mut category_bandits: HashMap<String, CategoryBandit> = HashMap::new();
    for e in candidates {
        for cat in &e.categories {
            let bandit = category_bandits.entry(cat.clone()).or_default();
            bandit.shown += e.shown_count;
            bandit.engagement_sum += signals::clamp01(e.engagement_score) * e.shown_count as f64;
        }
    }

    DatasetStats {
        total_shown,
        global_engagement_mean,
        content_type_means,
        category_bandits,
    }
}

/// Recency-weighted per-category sums: later entries in `items` weigh more
/// (spec.md §4.1 "Session signal maps"), weight `0.92^(len-1-index)`.
fn recency_weighted_counts(items: &[String]) -> HashMap<String, f64> {
    let len = items.len();
    let mut map: HashMap<String, f64> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        let weight = 0.92f64.powi((len - 1 - idx) as i32);
        *map.entry(item.clone()).or_insert(0.0) += weight;
    }
    map
}

fn category_prior(categories: &[String], bandits: &HashMap<String, CategoryBandit>, fallback: f64) -> f64 {
    let values: Vec<f64> = categories
        .iter()
        .filter_map(|c| bandits.get(c).filter(|b| b.shown > 0))
        .map(|b| b.engagement_sum / b.shown as f64)
        .collect();
    if values.is_empty() {
        fallback
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn category_novelty(categories: &[String], bandits: &HashMap<String, CategoryBandit>) -> f64 {
    categories
        .iter()
        .map(|c| {
            let shown = bandits.get(c).map(|b| b.shown).unwrap_or(0);
            1.0 / (shown as f64 + 1.0).sqrt()
        })
        .fold(0.0f64, f64::max)
}

fn session_novelty_flag(categories: &[String], engaged: &HashSet<String>, skipped: &HashSet<String>) -> bool {
    categories.iter().all(|c| !engaged.contains(c) && !skipped.contains(c))
}

fn days_since(t: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - t).num_seconds() as f64 / 86_400.0
}

/// Run the full scoring core over one batch of candidates. `time_prefs`
/// should already be scoped to the caller's current `(hourSlot, dayType)`
/// (spec.md §4.1 Inputs).
pub fn score(
    candidates: Vec<LibraryEntry>,
    session: &SessionContext,
    time_prefs: &[TimePreference],
    now: DateTime<Utc>,
) -> Vec<RankingCandidate> {
    let stats = compute_dataset_stats(&candidates);
    let engaged_weights = recency_weighted_counts(&session.engaged_categories);
    let skipped_weights = recency_weighted_counts(&session.skipped_categories);
    let engaged_set: HashSet<String> = session.engaged_categories.iter().cloned().collect();
    let skipped_set: HashSet<String> = session.skipped_categories.iter().cloned().collect();

    let time_pref_by_category: HashMap<&str, &TimePreference> = time_prefs
        .iter()
        .map(|p| (p.category.as_str(), p))
        .collect();
    let has_usable_time_prefs = time_prefs.iter().any(|p| p.sample_count >= 3);
    let has_embeddings = !session.engaged_embeddings.is_empty();

    let weights = weights::derive(&weights::Capabilities {
        has_embeddings,
        has_usable_time_prefs,
        cards_shown: session.cards_shown,
    });

    let mut scored: Vec<RankingCandidate> = candidates
        .into_iter()
        .map(|entry| score_one(entry, &stats, session, &engaged_weights, &skipped_weights, &engaged_set, &skipped_set, &time_pref_by_category, &weights, now))
        .collect();

    scored.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    scored
}

#[allow(clippy::too_many_arguments)]
fn score_one(
    entry: LibraryEntry,
    stats: &DatasetStats,
    session: &SessionContext,
    engaged_weights: &HashMap<String, f64>,
    skipped_weights: &HashMap<String, f64>,
    engaged_set: &HashSet<String>,
    skipped_set: &HashSet<String>,
    time_pref_by_category: &HashMap<&str, &TimePreference>,
    weights: &weights::Weights,
    now: DateTime<Utc>,
) -> RankingCandidate {
    let type_mean = stats
        .content_type_means
        .get(&entry.content_type)
        .copied()
        .unwrap_or(stats.global_engagement_mean);

    let f_engagement = signals::engagement_prediction(
        &signals::EngagementInputs {
            shown_count: entry.shown_count,
            engagement_score: entry.engagement_score,
            open_count: entry.open_count,
            last_shown_at: entry.last_shown_at,
            liked: entry.liked_at.is_some(),
            type_mean,
        },
        now,
    );

    let f_semantic = signals::semantic_match(entry.embedding.as_deref(), &session.engaged_embeddings);

    let momentum: f64 = entry
        .categories
        .iter()
        .map(|c| engaged_weights.get(c).copied().unwrap_or(0.0))
        .sum();
    let skip: f64 = entry
        .categories
        .iter()
        .map(|c| skipped_weights.get(c).copied().unwrap_or(0.0))
        .sum();
    let fatigue: f64 = entry
        .categories
        .iter()
        .map(|c| (engaged_weights.get(c).copied().unwrap_or(0.0) - 2.0).max(0.0))
        .sum();
    let same_lane = entry.categories.iter().any(|c| engaged_set.contains(c));
    let session_stats = signals::SessionCategoryStats {
        momentum,
        skip,
        fatigue,
        same_lane,
    };
    let f_session = signals::session_context(session.cards_shown, !entry.categories.is_empty(), &session_stats);

    let usable_time_prefs: Vec<f64> = entry
        .categories
        .iter()
        .filter_map(|c| time_pref_by_category.get(c.as_str()))
        .filter(|p| p.sample_count >= 3)
        .map(|p| p.avg_engagement)
        .collect();
    let f_time_pref = signals::time_preference(&usable_time_prefs);

    let f_freshness = signals::freshness(
        days_since(entry.added_at, now),
        entry.shown_count,
        entry.liked_at.is_some(),
    );

    let cat_novelty = category_novelty(&entry.categories, &stats.category_bandits);
    let sess_novelty = session_novelty_flag(&entry.categories, engaged_set, skipped_set);
    let f_exploration = signals::exploration(&signals::ExplorationInputs {
        shown_count: entry.shown_count,
        engagement_score: entry.engagement_score,
        category_prior: category_prior(&entry.categories, &stats.category_bandits, stats.global_engagement_mean),
        total_shown: stats.total_shown,
        category_novelty: cat_novelty,
        session_novelty: sess_novelty,
    });

    let base_score = f_engagement * weights.engagement
        + f_semantic * weights.semantic
        + f_session * weights.session
        + f_time_pref * weights.time_pref
        + f_freshness * weights.freshness
        + f_exploration * weights.exploration;

    let mut features = HashMap::with_capacity(21);
    features.insert("f_engagement".to_string(), f_engagement);
    features.insert("f_semantic".to_string(), f_semantic);
    features.insert("f_session".to_string(), f_session);
    features.insert("f_time_pref".to_string(), f_time_pref);
    features.insert("f_freshness".to_string(), f_freshness);
    features.insert("f_exploration".to_string(), f_exploration);
    features.insert(
        "f_shown_count_norm".to_string(),
        signals::clamp01(entry.shown_count as f64 / 20.0),
    );
    features.insert(
        "f_open_rate".to_string(),
        (entry.open_count as f64 / entry.shown_count.max(1) as f64).min(1.0),
    );
    features.insert(
        "f_days_since_added_norm".to_string(),
        signals::clamp01(days_since(entry.added_at, now) / 120.0),
    );
    features.insert(
        "f_is_liked".to_string(),
        if entry.liked_at.is_some() { 1.0 } else { 0.0 },
    );
    features.insert(
        "f_is_unseen".to_string(),
        if entry.shown_count == 0 { 1.0 } else { 0.0 },
    );
    features.insert(
        "f_category_count_norm".to_string(),
        signals::clamp01(entry.categories.len() as f64 / 4.0),
    );
    features.insert(
        "f_has_embedding".to_string(),
        if entry.embedding.is_some() { 1.0 } else { 0.0 },
    );
    features.insert("f_content_type_prior".to_string(), signals::clamp01(type_mean));
    features.insert("f_session_momentum".to_string(), signals::clamp01(momentum / 5.0));
    features.insert("f_session_skip_pressure".to_string(), signals::clamp01(skip / 5.0));
    features.insert("f_session_fatigue".to_string(), signals::clamp01(fatigue / 4.0));
    features.insert(
        "f_session_same_lane_boost".to_string(),
        if same_lane { 0.04 } else { 0.0 },
    );
    features.insert(
        "f_ucb_uncertainty".to_string(),
        signals::clamp01(
            ((stats.total_shown as f64 + 2.0).ln() / (entry.shown_count as f64 + 1.0)).sqrt() / 3.0,
        ),
    );
    features.insert("f_category_novelty".to_string(), signals::clamp01(cat_novelty));
    features.insert(
        "f_session_novelty".to_string(),
        if sess_novelty { 0.08 } else { 0.0 },
    );

    RankingCandidate {
        entry,
        base_score,
        rerank_score: None,
        final_score: base_score,
        breakdown: SignalBreakdown {
            engagement: f_engagement,
            semantic: f_semantic,
            session: f_session,
            time_pref: f_time_pref,
            freshness: f_freshness,
            exploration: f_exploration,
        },
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, EntryStatus};
    use chrono::Duration;

    fn base_entry(id: &str, categories: Vec<&str>, added_days_ago: i64) -> LibraryEntry {
        LibraryEntry {
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
            categories: categories.into_iter().map(String::from).collect(),
            ai_summary: None,
            metadata: serde_json::json!({}),
            embedding: None,
            status: EntryStatus::Active,
            added_at: Utc::now() - Duration::days(added_days_ago),
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
    fn scoring_is_a_permutation_preserving_length_and_ids() {
        let candidates = vec![
            base_entry("a", vec!["Tech"], 2),
            base_entry("b", vec!["AI"], 2),
            base_entry("c", vec!["Music"], 2),
        ];
        let session = SessionContext::new(vec![], vec![], vec![], vec![], 0);
        let result = score(candidates, &session, &[], Utc::now());
        assert_eq!(result.len(), 3);
        let mut ids: Vec<&str> = result.iter().map(|c| c.entry.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn every_candidate_has_all_21_features() {
        let candidates = vec![base_entry("a", vec!["Tech"], 2)];
        let session = SessionContext::new(vec![], vec![], vec![], vec![], 0);
        let result = score(candidates, &session, &[], Utc::now());
        assert_eq!(result[0].features.len(), 21);
        for v in result[0].features.values() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn cold_start_scenario_s1_ties_all_three_candidates() {
        let candidates = vec![
            base_entry("a", vec!["Tech"], 2),
            base_entry("b", vec!["Tech"], 2),
            base_entry("c", vec!["Tech"], 2),
        ];
        let session = SessionContext::new(vec![], vec![], vec![], vec![], 0);
        let result = score(candidates, &session, &[], Utc::now());
        let scores: Vec<f64> = result.iter().map(|c| c.final_score).collect();
        assert!((scores[0] - scores[1]).abs() < 1e-9);
        assert!((scores[1] - scores[2]).abs() < 1e-9);
        assert_eq!(
            result.iter().map(|c| c.entry.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn session_momentum_scenario_s2() {
        let mut ai_entry = base_entry("ai", vec!["AI"], 30);
        ai_entry.content_type = ContentType::Generic;
        let music_entry = base_entry("music", vec!["Music"], 30);

        let session = SessionContext::new(
            vec![],
            vec!["AI".to_string(), "AI".to_string(), "AI".to_string()],
            vec![],
            vec![],
            6,
        );
        let result = score(vec![ai_entry, music_entry], &session, &[], Utc::now());
        assert_eq!(result[0].entry.id, "ai");

        let expected_momentum = (0.92f64.powi(2) + 0.92 + 1.0) / 5.0;
        let ai_candidate = result.iter().find(|c| c.entry.id == "ai").unwrap();
        assert!((ai_candidate.features["f_session_momentum"] - signals::clamp01(expected_momentum)).abs() < 1e-9);
    }

    #[test]
    fn fatigue_threshold_scenario_s3() {
        let ai_entry = base_entry("ai", vec!["AI"], 10);
        let tech_entry = base_entry("tech", vec!["Tech"], 10);

        let engaged = vec!["AI".to_string(); 6];
        let session = SessionContext::new(vec![], engaged, vec![], vec![], 6);
        let result = score(vec![ai_entry, tech_entry], &session, &[], Utc::now());

        let ai_score = result.iter().find(|c| c.entry.id == "ai").unwrap().final_score;
        let tech_score = result.iter().find(|c| c.entry.id == "tech").unwrap().final_score;
        assert!(ai_score < tech_score);
    }
}
