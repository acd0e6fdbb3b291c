//! In-memory services for tests of this crate and its dependents.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use road_trip_lib::{Coordinate, RouteGeometry, RouteReport, RouteResult, RouteStep, RouteSummary};
use tokio::sync::Semaphore;

use crate::{
    actor::RouteReportSink,
    error::{NavigationError, ServiceError},
    position::{PositionEvent, PositionFeed, PositionSource, PositionSubscription},
    services::{GeocodingService, PlaceCandidate, RoutingService},
};

#[derive(Default)]
pub struct FakeGeocoding {
    places: Vec<PlaceCandidate>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeGeocoding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, name: &str, coordinate: Coordinate) -> Self {
        self.places.push(PlaceCandidate {
            coordinate,
            display_name: name.to_string(),
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl GeocodingService for FakeGeocoding {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PlaceCandidate>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::Api {
                status: 503,
                message: "geocoder down".to_string(),
            });
        }

        let query = query.to_lowercase();
        Ok(self
            .places
            .iter()
            .filter(|place| place.display_name.to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Straight-line routes with a fixed summary. Can hold responses until released.
pub struct FakeRouting {
    distance_meters: f64,
    duration_seconds: f64,
    calls: AtomicUsize,
    failing: AtomicBool,
    gate: Option<Semaphore>,
}

impl FakeRouting {
    pub fn new(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            distance_meters,
            duration_seconds,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Every request waits for a `release`.
    pub fn gated(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(distance_meters, duration_seconds)
        }
    }

    pub fn release(&self, requests: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(requests);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoutingService for FakeRouting {
    async fn driving_route(&self, start: Coordinate, end: Coordinate) -> Result<RouteResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::NoResult("NoRoute: no route found".to_string()));
        }

        Ok(RouteResult {
            geometry: RouteGeometry::new(vec![start, end]),
            summary: RouteSummary::new(self.distance_meters, self.duration_seconds),
            steps: vec![RouteStep {
                distance_meters: self.distance_meters,
                duration_seconds: self.duration_seconds,
                road_name: "BR-116".to_string(),
                maneuver_type: "depart".to_string(),
                maneuver_modifier: None,
            }],
        })
    }
}

enum Capability {
    Available,
    Unsupported,
    Denied,
}

/// Position source driven by the test through `publish`.
pub struct FakePositionSource {
    capability: Capability,
    feed: Mutex<Option<PositionFeed>>,
    subscriptions: AtomicUsize,
}

impl Default for FakePositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePositionSource {
    pub fn new() -> Self {
        Self::with_capability(Capability::Available)
    }

    pub fn unsupported() -> Self {
        Self::with_capability(Capability::Unsupported)
    }

    pub fn denied() -> Self {
        Self::with_capability(Capability::Denied)
    }

    fn with_capability(capability: Capability) -> Self {
        Self {
            capability,
            feed: Mutex::new(None),
            subscriptions: AtomicUsize::new(0),
        }
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    fn current_feed(&self) -> Option<PositionFeed> {
        self.feed.lock().ok().and_then(|feed| feed.clone())
    }

    /// Returns false when nobody is subscribed.
    pub async fn publish(&self, event: PositionEvent) -> bool {
        match self.current_feed() {
            Some(feed) => feed.publish(event).await,
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.current_feed().is_none_or(|feed| feed.is_cancelled())
    }
}

impl PositionSource for FakePositionSource {
    fn subscribe(&self) -> Result<PositionSubscription, NavigationError> {
        match self.capability {
            Capability::Unsupported => return Err(NavigationError::DeviceLocationUnsupported),
            Capability::Denied => return Err(NavigationError::DeviceLocationDenied),
            Capability::Available => {}
        }

        let (feed, subscription) = PositionSubscription::channel(16);
        if let Ok(mut current) = self.feed.lock() {
            *current = Some(feed);
        }
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(subscription)
    }
}


/// Keeps every report it receives.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<RouteReport>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<RouteReport> {
        self.reports.lock().map(|reports| reports.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RouteReportSink for RecordingSink {
    async fn report(&self, report: RouteReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}
