use async_trait::async_trait;
use road_trip_lib::{Coordinate, RouteResult};

use crate::error::ServiceError;

/// One geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub coordinate: Coordinate,
    pub display_name: String,
}

/// Free-text place lookup, best match first.
#[async_trait]
pub trait GeocodingService: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PlaceCandidate>, ServiceError>;
}

/// Driving directions between two coordinates.
#[async_trait]
pub trait RoutingService: Send + Sync {
    async fn driving_route(&self, start: Coordinate, end: Coordinate) -> Result<RouteResult, ServiceError>;
}
