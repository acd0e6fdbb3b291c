use async_trait::async_trait;
use road_trip_lib::trip::AppData;

use crate::DataManagerError;

pub mod constants;
pub mod db;
pub mod memory;

/// Remote home of the per-user document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<AppData>, DataManagerError>;
    async fn save(&self, user_id: &str, data: &AppData) -> Result<(), DataManagerError>;
}
