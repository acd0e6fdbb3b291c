use std::sync::Arc;

use road_trip_lib::{Coordinate, RouteResult};
use tracing::{debug, warn};

use crate::{error::NavigationError, services::RoutingService};

/// Fetches driving routes. Any failure is reported as Unavailable.
#[derive(Clone)]
pub struct Router {
    service: Arc<dyn RoutingService>,
}

impl Router {
    pub fn new(service: Arc<dyn RoutingService>) -> Self {
        Self { service }
    }

    pub async fn route(&self, start: Coordinate, end: Coordinate) -> Result<RouteResult, NavigationError> {
        match self.service.driving_route(start, end).await {
            Ok(route) => {
                debug!(
                    "Route {:?} -> {:?}: {} m, {} s, {} points",
                    start,
                    end,
                    route.summary.distance_meters,
                    route.summary.duration_seconds,
                    route.geometry.len()
                );
                Ok(route)
            }
            Err(err) => {
                warn!("Routing {:?} -> {:?} failed: {}", start, end, err);
                Err(NavigationError::Unavailable(err.to_string()))
            }
        }
    }
}
