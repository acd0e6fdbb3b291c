use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use road_trip_lib::trip::AppData;
use tokio::sync::Mutex;

use crate::DataManagerError;

use super::DocumentStore;

/// Keeps documents in memory. Can be switched offline to exercise the sync fallbacks.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, AppData>>,
    offline: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), DataManagerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DataManagerError::Database("Store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load(&self, user_id: &str) -> Result<Option<AppData>, DataManagerError> {
        self.check_online()?;
        Ok(self.documents.lock().await.get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, data: &AppData) -> Result<(), DataManagerError> {
        self.check_online()?;
        self.documents.lock().await.insert(user_id.to_string(), data.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
