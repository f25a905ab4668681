//! Environment-driven configuration, shaped after
//! `feed-service/src/config/mod.rs`: one `Config::from_env()` entry point
//! with sub-structs per concern and `unwrap_or_else` defaults for anything
//! optional.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub reranker: RerankerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    /// Fixed cookie name per spec.md §6.
    pub cookie_name: String,
    pub expiry_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub model_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            session: SessionConfig {
                secret: std::env::var("SESSION_SECRET")?,
                cookie_name: "driftfeed_session".to_string(),
                expiry_days: 30,
            },
            reranker: RerankerConfig {
                enabled: std::env::var("ENABLE_XGBOOST_RERANKER")
                    .map(|v| v == "true")
                    .unwrap_or(false),
                model_path: std::env::var("XGBOOST_RERANKER_MODEL_PATH")
                    .unwrap_or_else(|_| "models/xgboost-reranker.json".to_string()),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}
