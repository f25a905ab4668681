pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
