//! The six ranking signals. Each is a pure function of already-derived
//! scalar inputs so they can be unit tested independently of the
//! candidate/session plumbing in `mod.rs` (spec.md §4.1, §9 design note
//! "represent them as a small struct and keep the weight derivation a pure
//! function").

use chrono::{DateTime, Utc};

pub fn clamp01(x: f64) -> f64 {
    x.max(0.0).min(1.0)
}

pub struct EngagementInputs {
    pub shown_count: i64,
    pub engagement_score: f64,
    pub open_count: i64,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub liked: bool,
    pub type_mean: f64,
}

pub fn engagement_prediction(i: &EngagementInputs, now: DateTime<Utc>) -> f64 {
    let liked_boost = if i.liked { 0.08 } else { 0.0 };

    if i.shown_count == 0 {
        return clamp01(0.58 + (i.type_mean - 0.5) * 0.2 + liked_boost);
    }

    let baseline = if i.engagement_score > 0.0 {
        i.engagement_score * 0.72 + i.type_mean * 0.28
    } else {
        i.type_mean * 0.9
    };
    let recency_signal = match i.last_shown_at {
        Some(last) => {
            let days_since = (now - last).num_seconds() as f64 / 86_400.0;
            (-days_since / 30.0).exp()
        }
        None => 0.55,
    };
    let open_signal = (i.open_count as f64 / (i.shown_count.max(1) as f64)).min(1.0) * 0.2;
    let over_shown_penalty = (((i.shown_count - 10).max(0)) as f64 * 0.015).min(0.22);

    clamp01(baseline * 0.67 + recency_signal * 0.23 + open_signal + liked_boost - over_shown_penalty)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for idx in 0..len {
        let (x, y) = (a[idx] as f64, b[idx] as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub fn semantic_match(entry_embedding: Option<&[f32]>, engaged_embeddings: &[Vec<f32>]) -> f64 {
    let Some(embedding) = entry_embedding else {
        return 0.5;
    };
    if engaged_embeddings.is_empty() {
        return 0.5;
    }

    let sims: Vec<f64> = engaged_embeddings
        .iter()
        .map(|e| clamp01((cosine_similarity(embedding, e) + 1.0) / 2.0))
        .collect();
    let max = sims.iter().cloned().fold(f64::MIN, f64::max);
    let mean = sims.iter().sum::<f64>() / sims.len() as f64;

    max * 0.65 + mean * 0.35
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCategoryStats {
    pub momentum: f64,
    pub skip: f64,
    pub fatigue: f64,
    pub same_lane: bool,
}

pub fn session_context(cards_shown: i64, has_categories: bool, stats: &SessionCategoryStats) -> f64 {
    if cards_shown == 0 || !has_categories {
        return 0.5;
    }
    let same_lane_boost = if stats.same_lane { 0.04 } else { 0.0 };
    clamp01(
        0.5 + (stats.momentum * 0.07).min(0.32) - (stats.skip * 0.1).min(0.34)
            - (stats.fatigue * 0.04).min(0.2)
            + same_lane_boost,
    )
}

pub fn time_preference(usable_avgs: &[f64]) -> f64 {
    if usable_avgs.is_empty() {
        return 0.5;
    }
    clamp01(usable_avgs.iter().cloned().fold(f64::MIN, f64::max))
}

pub fn freshness(days_since_added: f64, shown_count: i64, liked: bool) -> f64 {
    let mut score = if days_since_added < 1.0 {
        0.72
    } else if days_since_added < 14.0 {
        0.56
    } else if days_since_added <= 56.0 {
        0.88
    } else if days_since_added <= 120.0 {
        0.42
    } else {
        0.25
    };
    score -= (shown_count as f64 * 0.028).min(0.35);
    if liked {
        score += 0.08;
    }
    clamp01(score)
}

pub struct ExplorationInputs {
    pub shown_count: i64,
    pub engagement_score: f64,
    pub category_prior: f64,
    pub total_shown: i64,
    pub category_novelty: f64,
    pub session_novelty: bool,
}

pub fn exploration(i: &ExplorationInputs) -> f64 {
    let mean_estimate = if i.shown_count > 0 {
        i.engagement_score
    } else {
        i.category_prior
    };
    let uncertainty = ((i.total_shown as f64 + 2.0).ln() / (i.shown_count as f64 + 1.0)).sqrt();
    let session_novelty = if i.session_novelty { 0.08 } else { 0.0 };

    clamp01(mean_estimate + uncertainty * 0.28 + i.category_novelty * 0.14 + session_novelty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_engagement_uses_type_mean_only() {
        let i = EngagementInputs {
            shown_count: 0,
            engagement_score: 0.0,
            open_count: 0,
            last_shown_at: None,
            liked: false,
            type_mean: 0.5,
        };
        assert!((engagement_prediction(&i, Utc::now()) - 0.58).abs() < 1e-9);
    }

    #[test]
    fn semantic_match_is_neutral_without_embeddings() {
        assert_eq!(semantic_match(None, &[vec![1.0, 0.0]]), 0.5);
        assert_eq!(semantic_match(Some(&[1.0, 0.0]), &[]), 0.5);
    }

    #[test]
    fn session_context_neutral_with_no_cards_shown() {
        let stats = SessionCategoryStats {
            momentum: 5.0,
            skip: 0.0,
            fatigue: 0.0,
            same_lane: true,
        };
        assert_eq!(session_context(0, true, &stats), 0.5);
    }

    #[test]
    fn freshness_forgotten_gem_window_peaks() {
        assert!((freshness(30.0, 0, false) - 0.88).abs() < 1e-9);
        assert!(freshness(30.0, 0, false) > freshness(200.0, 0, false));
    }

    #[test]
    fn time_preference_falls_back_to_neutral() {
        assert_eq!(time_preference(&[]), 0.5);
    }
}
