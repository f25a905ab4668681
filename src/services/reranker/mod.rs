//! Tree-ensemble reranker (spec.md §4.2), grounded on the lazy
//! path-keyed model cache in
//! `feed-service/src/services/recommendation_v2/onnx_serving.rs`
//! (`ONNXModelServer` caches loaded models by path behind an `Arc`). Here the
//! "model" is a small serialized decision-tree ensemble rather than an ONNX
//! graph, but the caching discipline — load once per path, pass through on
//! any failure — is the same.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::warn;

use crate::services::scoring::RankingCandidate;

static MODEL_CACHE: Lazy<DashMap<PathBuf, Arc<RerankerModel>>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Objective {
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "reg:squarederror")]
    RegSquaredError,
    #[serde(rename = "rank:pairwise")]
    RankPairwise,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Leaf {
        leaf: f64,
    },
    Internal {
        feature: String,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        default_left: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankerModel {
    #[serde(rename = "modelType")]
    pub model_type: String,
    pub objective: Objective,
    pub version: String,
    #[serde(rename = "baseScore")]
    pub base_score: f64,
    #[serde(rename = "featureOrder")]
    pub feature_order: Vec<String>,
    trees: Vec<Tree>,
}

const MAX_TREE_WALK_STEPS: usize = 2048;

impl RerankerModel {
    fn eval_tree(tree: &Tree, features: &[f64], feature_order: &[String]) -> f64 {
        let mut node_idx = 0usize;
        for _ in 0..MAX_TREE_WALK_STEPS {
            let Some(node) = tree.nodes.get(node_idx) else {
                return 0.0;
            };
            match node {
                Node::Leaf { leaf } => return *leaf,
                Node::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = feature_order
                        .iter()
                        .position(|f| f == feature)
                        .and_then(|idx| features.get(idx))
                        .copied()
                        .unwrap_or(f64::NAN);
                    node_idx = if value.is_nan() {
                        if *default_left {
                            *left
                        } else {
                            *right
                        }
                    } else if value < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
        0.0
    }

    fn margin(&self, features: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| Self::eval_tree(t, features, &self.feature_order))
                .sum::<f64>()
    }

    pub fn raw_score(&self, feature_map: &HashMap<String, f64>) -> f64 {
        let vector: Vec<f64> = self
            .feature_order
            .iter()
            .map(|name| feature_map.get(name).copied().unwrap_or(0.0))
            .collect();
        let margin = self.margin(&vector);
        match self.objective {
            Objective::BinaryLogistic => sigmoid(margin),
            Objective::RegSquaredError | Objective::RankPairwise => margin,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn load_model(path: &Path) -> Option<Arc<RerankerModel>> {
    if let Some(cached) = MODEL_CACHE.get(path) {
        return Some(cached.clone());
    }
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!("reranker model not readable at {:?}: {}", path, e);
            return None;
        }
    };
    let model: RerankerModel = match serde_json::from_slice(&bytes) {
        Ok(m) => m,
        Err(e) => {
            warn!("reranker model at {:?} failed to parse: {}", path, e);
            return None;
        }
    };
    let model = Arc::new(model);
    MODEL_CACHE.insert(path.to_path_buf(), model.clone());
    Some(model)
}

/// Min-max normalize a score vector to [0,1]; degenerate sets (all equal or
/// any non-finite) collapse to `0.5` for every element (spec.md §4.2,
/// §8 round-trip law "min -> 0, max -> 1").
fn normalize(scores: &[f64]) -> Vec<f64> {
    if scores.iter().any(|s| !s.is_finite()) {
        return vec![0.5; scores.len()];
    }
    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        return vec![0.5; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

pub struct RerankOutcome {
    pub candidates: Vec<RankingCandidate>,
    pub applied: bool,
    pub version: Option<String>,
}

/// Apply the configured reranker model, if any, and re-sort by blended
/// score. Any failure to locate/parse/evaluate the model is a pass-through,
/// never a request failure (spec.md §4.2, §9 design note).
pub fn apply(mut candidates: Vec<RankingCandidate>, enabled: bool, model_path: &str) -> RerankOutcome {
    if !enabled {
        return RerankOutcome {
            candidates,
            applied: false,
            version: None,
        };
    }

    let Some(model) = load_model(Path::new(model_path)) else {
        return RerankOutcome {
            candidates,
            applied: false,
            version: None,
        };
    };

    let raw_scores: Vec<f64> = candidates.iter().map(|c| model.raw_score(&c.features)).collect();
    let normalized = normalize(&raw_scores);

    for (candidate, model_score) in candidates.iter_mut().zip(normalized.into_iter()) {
        candidate.rerank_score = Some(model_score);
        candidate.final_score = candidate.base_score * 0.35 + model_score * 0.65;
    }

    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    RerankOutcome {
        candidates,
        applied: true,
        version: Some(model.version.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_min_max_round_trip() {
        let scores = vec![1.0, 5.0, 3.0];
        let n = normalize(&scores);
        assert!((n[0] - 0.0).abs() < 1e-9);
        assert!((n[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_degenerate_set_is_neutral() {
        assert_eq!(normalize(&[0.4, 0.4, 0.4]), vec![0.5, 0.5, 0.5]);
        assert_eq!(normalize(&[f64::NAN, 0.2]), vec![0.5, 0.5]);
    }

    #[test]
    fn missing_model_file_passes_through() {
        let outcome = apply(vec![], true, "/nonexistent/path/does-not-exist.json");
        assert!(!outcome.applied);
        assert!(outcome.version.is_none());
    }

    #[test]
    fn disabled_reranker_passes_through_without_touching_disk() {
        let outcome = apply(vec![], false, "/nonexistent/path.json");
        assert!(!outcome.applied);
    }

    #[test]
    fn tree_walk_honors_threshold_split() {
        let tree = Tree {
            nodes: vec![
                Node::Internal {
                    feature: "f_engagement".to_string(),
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                    default_left: false,
                },
                Node::Leaf { leaf: -1.0 },
                Node::Leaf { leaf: 1.0 },
            ],
        };
        let order = vec!["f_engagement".to_string()];
        assert_eq!(RerankerModel::eval_tree(&tree, &[0.2], &order), -1.0);
        assert_eq!(RerankerModel::eval_tree(&tree, &[0.8], &order), 1.0);
    }
}
