//! Business-logic layer, grounded on the `services/` module layout of
//! `feed-service` and `ranking-service`: one module per pipeline stage.

pub mod diversity;
pub mod engagement;
pub mod export;
pub mod ingestor;
pub mod reranker;
pub mod scoring;
