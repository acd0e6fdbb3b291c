use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use const_format::concatcp;
use road_trip_lib::trip::AppData;
use sqlx::{Executor, Pool, Sqlite, SqlitePool, query, query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions}};
use tracing::debug;

use crate::DataManagerError;

use super::{DocumentStore, constants::*};

/// One JSON document per user.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentStore {
    pub async fn connect(path: &Path) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to connect to database {:?}: {}", path, err)))?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// A private database living as long as the store. Used by tests and offline runs.
    pub async fn connect_in_memory() -> Result<Self, DataManagerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:").await
            .map_err(|err| DataManagerError::Database(format!("Failed to open in-memory database: {}", err)))?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", USER_DOCUMENTS_TABLE_NAME, "(",
                USER_ID,    " TEXT PRIMARY KEY NOT NULL,",
                DOCUMENT,   " TEXT NOT NULL,",
                UPDATED_AT, " TIMESTAMP NOT NULL
            )")).await
            .map_err(|err| DataManagerError::Database(format!("Failed to create tables: {}", err)))
            .map(|_| ())
    }

    pub async fn updated_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, DataManagerError> {
        query_as::<_, (DateTime<Utc>,)>(concatcp!("SELECT ", UPDATED_AT, " FROM ", USER_DOCUMENTS_TABLE_NAME, " WHERE ", USER_ID, " = ?1"))
            .bind(user_id)
            .fetch_optional(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get document timestamp".to_string()))
            .map(|row| row.map(|row| row.0))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn load(&self, user_id: &str) -> Result<Option<AppData>, DataManagerError> {
        let row = query_as::<_, (String,)>(concatcp!("SELECT ", DOCUMENT, " FROM ", USER_DOCUMENTS_TABLE_NAME, " WHERE ", USER_ID, " = ?1"))
            .bind(user_id)
            .fetch_optional(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get document".to_string()))?;

        let Some((json,)) = row else {
            return Ok(None);
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|err| DataManagerError::Database(format!("Stored document for {} is invalid: {}", user_id, err)))
    }

    async fn save(&self, user_id: &str, data: &AppData) -> Result<(), DataManagerError> {
        let json = serde_json::to_string(data)
            .map_err(|err| DataManagerError::Database(format!("Failed to serialize document: {}", err)))?;

        query(concatcp!("
            INSERT INTO ", USER_DOCUMENTS_TABLE_NAME, "(", USER_ID, ", ", DOCUMENT, ", ", UPDATED_AT, ")
            VALUES (?1, ?2, ?3)
            ON CONFLICT(", USER_ID, ") DO UPDATE SET ", DOCUMENT, " = excluded.", DOCUMENT, ", ", UPDATED_AT, " = excluded.", UPDATED_AT))
            .bind(user_id)
            .bind(&json)
            .bind(Utc::now())
            .execute(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to save document".to_string()))?;

        debug!("Saved document for {} ({} bytes)", user_id, json.len());
        Ok(())
    }
}
