use thiserror::Error;

pub mod assistant;
pub mod cache;
pub mod config;
pub mod database;
mod data_manager;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_FILE: &str = "database.db";
pub const CACHE_FILE: &str = "app_data.json";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataManagerError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Local cache error: {0}")]
    Cache(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not found: {0}")]
    NotFound(String),
}
