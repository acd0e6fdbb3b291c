use std::path::PathBuf;

use crate::{DATA_DIR, DataManagerError};

pub const DEFAULT_USER_ID: &str = "local";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";
pub const DEFAULT_USER_AGENT: &str = "road-trip-organizer/0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_TRACKER_PORT: u16 = 3169;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub user_id: String,
    pub nominatim_url: String,
    pub osrm_url: String,
    pub user_agent: String,
    /// Assistant features are off without it
    pub assistant_url: Option<String>,
    pub http_port: u16,
    pub tracker_port: u16,
    pub cloud_sync: bool,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, DataManagerError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DataManagerError> {
        let var = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        let data_dir = match var("ROAD_TRIP_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => project_root::get_project_root()
                .map(|root| root.join(DATA_DIR))
                .unwrap_or_else(|_| PathBuf::from(DATA_DIR)),
        };

        Ok(Self {
            data_dir,
            user_id: var("ROAD_TRIP_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            nominatim_url: var("ROAD_TRIP_NOMINATIM_URL").unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            osrm_url: var("ROAD_TRIP_OSRM_URL").unwrap_or_else(|| DEFAULT_OSRM_URL.to_string()),
            user_agent: var("ROAD_TRIP_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            assistant_url: var("ROAD_TRIP_ASSISTANT_URL"),
            http_port: parse_port(var("ROAD_TRIP_HTTP_PORT"), "ROAD_TRIP_HTTP_PORT", DEFAULT_HTTP_PORT)?,
            tracker_port: parse_port(var("ROAD_TRIP_TRACKER_PORT"), "ROAD_TRIP_TRACKER_PORT", DEFAULT_TRACKER_PORT)?,
            cloud_sync: parse_bool(var("ROAD_TRIP_CLOUD_SYNC"), "ROAD_TRIP_CLOUD_SYNC", true)?,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(crate::DATABASE_FILE)
    }
}

fn parse_port(value: Option<String>, key: &str, default: u16) -> Result<u16, DataManagerError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| DataManagerError::Config(format!("{} must be a port number, got '{}'", key, value))),
    }
}

fn parse_bool(value: Option<String>, key: &str, default: bool) -> Result<bool, DataManagerError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(DataManagerError::Config(format!("{} must be true or false, got '{}'", key, other))),
    }
}
