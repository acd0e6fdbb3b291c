use async_trait::async_trait;
use road_trip_lib::{Coordinate, RouteGeometry, RouteResult, RouteStep, RouteSummary};
use serde::Deserialize;
use tracing::debug;

use crate::{error::ServiceError, services::RoutingService};

pub const OSRM_ROUTE_API_PATH: &str = "/route/v1/driving/";

#[derive(Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    /// Meters
    distance: f64,
    /// Seconds
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: [longitude, latitude]
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    maneuver_type: String,
    modifier: Option<String>,
}

pub struct OsrmRouteClientParams {
    pub base_url: String,
}

pub struct OsrmRouteClient {
    params: OsrmRouteClientParams,
    client: reqwest::Client,
}

impl OsrmRouteClient {
    pub fn new(params: OsrmRouteClientParams) -> Self {
        Self {
            params,
            client: reqwest::Client::new(),
        }
    }

    fn route_url(&self, start: Coordinate, end: Coordinate) -> String {
        // OSRM takes longitude first
        format!(
            "{}{}{},{};{},{}",
            self.params.base_url.trim_end_matches('/'),
            OSRM_ROUTE_API_PATH,
            start.lng,
            start.lat,
            end.lng,
            end.lat
        )
    }
}

#[async_trait]
impl RoutingService for OsrmRouteClient {
    async fn driving_route(&self, start: Coordinate, end: Coordinate) -> Result<RouteResult, ServiceError> {
        let url = self.route_url(start, end);
        debug!("OSRM: requesting {}", url);

        let response = self
            .client
            .get(url)
            .query(&[("overview", "full"), ("geometries", "geojson"), ("steps", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api { status, message });
        }

        let body = response.text().await?;
        parse_route_response(&body)
    }
}

/// Converts an OSRM route body, swapping geometry into (latitude, longitude) order.
pub fn parse_route_response(body: &str) -> Result<RouteResult, ServiceError> {
    let response: OsrmRouteResponse = serde_json::from_str(body)?;

    if response.code != "Ok" {
        let reason = match response.message {
            Some(message) => format!("{}: {}", response.code, message),
            None => response.code,
        };
        return Err(ServiceError::NoResult(reason));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::NoResult("no routes".to_string()))?;

    let geometry = RouteGeometry::new(
        route
            .geometry
            .coordinates
            .into_iter()
            .map(Coordinate::from_lng_lat)
            .collect(),
    );

    let steps = route
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .map(|step| RouteStep {
            distance_meters: step.distance,
            duration_seconds: step.duration,
            road_name: step.name,
            maneuver_type: step.maneuver.maneuver_type,
            maneuver_modifier: step.maneuver.modifier,
        })
        .collect();

    Ok(RouteResult {
        geometry,
        summary: RouteSummary::new(route.distance, route.duration),
        steps,
    })
}
