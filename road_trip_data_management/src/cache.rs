use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use road_trip_lib::trip::AppData;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{CACHE_FILE, DataManagerError};

/// The offline copy of the user's document, stored as a JSON file.
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
    /// Shared by clones, one write at a time
    write_lock: Arc<Mutex<()>>,
}

impl LocalCache {
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CACHE_FILE),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// None if nothing has been cached yet.
    pub async fn load(&self) -> Result<Option<AppData>, DataManagerError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(DataManagerError::Cache(format!("Failed to read {:?}: {}", self.path, err))),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|err| DataManagerError::Cache(format!("Cached document {:?} is invalid: {}", self.path, err)))
    }

    /// Written to a temporary file first so a crash never leaves half a document.
    pub async fn save(&self, data: &AppData) -> Result<(), DataManagerError> {
        let _guard = self.write_lock.lock().await;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await
                .map_err(|err| DataManagerError::Cache(format!("Failed to create cache directory {:?}: {}", dir, err)))?;
        }

        let json = serde_json::to_vec_pretty(data)
            .map_err(|err| DataManagerError::Cache(format!("Failed to serialize document: {}", err)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await
            .map_err(|err| DataManagerError::Cache(format!("Failed to write {:?}: {}", tmp, err)))?;
        tokio::fs::rename(&tmp, &self.path).await
            .map_err(|err| DataManagerError::Cache(format!("Failed to replace {:?}: {}", self.path, err)))?;

        debug!("Cached document at {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("road_trip_test_{:016x}", rand::random::<u64>()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty_cache() {
        let cache = LocalCache::in_dir(&temp_data_dir());
        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn saved_document_loads_back() {
        let dir = temp_data_dir();
        let cache = LocalCache::in_dir(&dir);

        let mut data = AppData::default();
        data.create_trip(Utc::now()).details.destination = "Gramado".into();
        cache.save(&data).await.unwrap();

        assert_eq!(cache.load().await.unwrap(), Some(data));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn overlapping_saves_both_succeed() {
        let dir = temp_data_dir();
        let cache = LocalCache::in_dir(&dir);
        let other = cache.clone();

        let mut first = AppData::default();
        first.create_trip(Utc::now()).details.destination = "Gramado".into();
        let mut second = AppData::default();
        second.create_trip(Utc::now()).details.destination = "Canela".into();

        let (a, b) = tokio::join!(cache.save(&first), other.save(&second));
        a.unwrap();
        b.unwrap();

        let loaded = cache.load().await.unwrap().unwrap();
        assert!(loaded == first || loaded == second);
        assert!(!cache.path().with_extension("json.tmp").exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = temp_data_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let cache = LocalCache::in_dir(&dir);
        std::fs::write(cache.path(), "{ not json").unwrap();

        assert!(matches!(cache.load().await, Err(DataManagerError::Cache(_))));
        let _ = std::fs::remove_dir_all(dir);
    }
}
