use thiserror::Error;

/// Failures the route core reports. None of them are fatal to the process.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavigationError {
    #[error("Address could not be resolved: {address}")]
    NotFound { address: String },

    #[error("Routing service unavailable: {0}")]
    Unavailable(String),

    #[error("Device location is not supported")]
    DeviceLocationUnsupported,

    #[error("Device location permission denied")]
    DeviceLocationDenied,

    #[error("Device location error: {0}")]
    DeviceLocationError(String),

    #[error("Tracking is already active")]
    AlreadyTracking,

    #[error("Tracking is not active")]
    NotTracking,

    #[error("Route view is not running")]
    ViewClosed,
}

/// Transport level failures of the external services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Service returned no result: {0}")]
    NoResult(String),
}
