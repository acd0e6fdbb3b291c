use chrono::{DateTime, Utc};
use road_trip_lib::{Bounds, Coordinate, RouteMode, RouteReport, RouteResult, Waypoint, WaypointRole};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    display::{DisplayPhase, DisplayedRoute, RouteDisplay},
    error::NavigationError,
    geocoder::Geocoder,
    position::{PositionEvent, PositionFix, PositionSource},
    router::Router,
    tracker::GpsTracker,
};

/// Share of the shown area added around the route on every side.
pub const MAP_BOUNDS_PADDING: f64 = 0.2;

/// Identifies the state a request was issued from.
/// The epoch moves whenever tracking starts or stops or the route text changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag {
    pub epoch: u64,
    pub seq: u64,
}

/// Network work decided by the view, executed outside of it.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteJob {
    Static {
        tag: RequestTag,
        origin: String,
        destination: String,
    },
    Live {
        tag: RequestTag,
        from: Coordinate,
        destination: String,
        cached_destination: Option<Coordinate>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteCompletion {
    Static {
        tag: RequestTag,
        origin_text: String,
        destination_text: String,
        origin: Result<Coordinate, NavigationError>,
        destination: Result<Coordinate, NavigationError>,
        /// None when an endpoint could not be resolved
        route: Option<Result<RouteResult, NavigationError>>,
    },
    Live {
        tag: RequestTag,
        destination: Result<Coordinate, NavigationError>,
        route: Option<Result<RouteResult, NavigationError>>,
    },
}

impl RouteCompletion {
    pub fn tag(&self) -> RequestTag {
        match self {
            RouteCompletion::Static { tag, .. } | RouteCompletion::Live { tag, .. } => *tag,
        }
    }
}

impl RouteJob {
    pub fn tag(&self) -> RequestTag {
        match self {
            RouteJob::Static { tag, .. } | RouteJob::Live { tag, .. } => *tag,
        }
    }

    pub async fn run(self, geocoder: &Geocoder, router: &Router) -> RouteCompletion {
        match self {
            RouteJob::Static {
                tag,
                origin: origin_text,
                destination: destination_text,
            } => {
                let (origin, destination) =
                    tokio::join!(geocoder.resolve(&origin_text), geocoder.resolve(&destination_text));

                let route = match (&origin, &destination) {
                    (Ok(start), Ok(end)) => Some(router.route(*start, *end).await),
                    _ => None,
                };

                RouteCompletion::Static {
                    tag,
                    origin_text,
                    destination_text,
                    origin,
                    destination,
                    route,
                }
            }
            RouteJob::Live {
                tag,
                from,
                destination,
                cached_destination,
            } => {
                let destination = match cached_destination {
                    Some(coordinate) => Ok(coordinate),
                    None => geocoder.resolve(&destination).await,
                };

                let route = match &destination {
                    Ok(end) => Some(router.route(from, *end).await),
                    Err(_) => None,
                };

                RouteCompletion::Live { tag, destination, route }
            }
        }
    }
}

/// Everything a UI needs to draw the route view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteViewSnapshot {
    pub origin: String,
    pub destination: String,
    pub phase: DisplayPhase,
    pub loading: bool,
    pub tracking: bool,
    pub live_position: Option<PositionFix>,
    pub endpoints: Vec<Waypoint>,
    pub route: Option<DisplayedRoute>,
    /// Area to fit the map to
    pub bounds: Option<Bounds>,
    pub last_error: Option<String>,
}

/// Owns the route display and the GPS tracker, and decides which requests to make.
///
/// All mutation happens through `&mut self` on one task. Requests come out as
/// [`RouteJob`]s and their results are fed back through [`RouteView::apply`], which
/// drops anything issued before the last mode or text change.
#[derive(Default)]
pub struct RouteView {
    origin: String,
    destination: String,
    display: RouteDisplay,
    tracker: GpsTracker,
    epoch: u64,
    next_seq: u64,
    applied_seq: u64,
    last_error: Option<String>,
}

impl RouteView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracker.is_tracking()
    }

    pub fn display(&self) -> &RouteDisplay {
        &self.display
    }

    pub fn tracker(&self) -> &GpsTracker {
        &self.tracker
    }

    fn next_tag(&mut self) -> RequestTag {
        self.next_seq += 1;
        RequestTag {
            epoch: self.epoch,
            seq: self.next_seq,
        }
    }

    fn is_current(&self, tag: RequestTag) -> bool {
        tag.epoch == self.epoch && tag.seq > self.applied_seq
    }

    fn static_job(&mut self) -> Option<RouteJob> {
        if self.origin.trim().is_empty() && self.destination.trim().is_empty() {
            self.display.reset();
            return None;
        }

        self.display.begin_resolving();
        Some(RouteJob::Static {
            tag: self.next_tag(),
            origin: self.origin.clone(),
            destination: self.destination.clone(),
        })
    }

    /// New address text. Recomputes the static route unless tracking, where only
    /// the destination used by the next live refresh changes.
    pub fn set_route_text(&mut self, origin: &str, destination: &str) -> Option<RouteJob> {
        let destination_changed = self.destination.trim() != destination.trim();
        self.origin = origin.to_string();
        self.destination = destination.to_string();
        self.epoch += 1;

        if self.tracker.is_tracking() {
            if destination_changed {
                self.tracker.forget_destination();
            }
            return None;
        }

        self.last_error = None;
        self.static_job()
    }

    /// Recomputes the static route for the current text. Nothing to do while tracking.
    pub fn refresh(&mut self) -> Option<RouteJob> {
        if self.tracker.is_tracking() {
            return None;
        }
        self.epoch += 1;
        self.static_job()
    }

    pub fn start_tracking(&mut self, source: &dyn PositionSource) -> Result<(), NavigationError> {
        let cached_destination = self
            .display
            .destination_waypoint()
            .filter(|waypoint| waypoint.matches_address(&self.destination))
            .map(|waypoint| waypoint.coordinate);

        if let Err(err) = self.tracker.start(source, cached_destination) {
            warn!("Could not start tracking: {}", err);
            if err != NavigationError::AlreadyTracking {
                self.last_error = Some(err.to_string());
            }
            return Err(err);
        }

        self.epoch += 1;
        self.last_error = None;
        Ok(())
    }

    /// Back to static mode. Live responses still in flight are dropped.
    pub fn stop_tracking(&mut self) -> Result<Option<RouteJob>, NavigationError> {
        if !self.tracker.stop() {
            return Err(NavigationError::NotTracking);
        }

        self.epoch += 1;
        Ok(self.static_job())
    }

    pub fn handle_position(&mut self, event: PositionEvent, now: DateTime<Utc>) -> Option<RouteJob> {
        if !self.tracker.is_tracking() {
            return None;
        }

        match event {
            PositionEvent::Fix(fix) => {
                let request = self.tracker.on_fix(fix, &self.destination, now)?;
                debug!("Live route refresh from {:?}", request.from);
                Some(RouteJob::Live {
                    tag: self.next_tag(),
                    from: request.from,
                    destination: self.destination.clone(),
                    cached_destination: request.cached_destination,
                })
            }
            PositionEvent::Error(message) => {
                let err = NavigationError::DeviceLocationError(message);
                warn!("{}, stopping tracking", err);
                self.tracker.stop();
                self.epoch += 1;
                let job = self.static_job();
                self.last_error = Some(err.to_string());
                job
            }
            PositionEvent::Ended => {
                info!("Position source ended, stopping tracking");
                self.tracker.stop();
                self.epoch += 1;
                self.static_job()
            }
        }
    }

    /// Waits for the next device event while tracking.
    pub async fn next_position_event(&mut self) -> PositionEvent {
        self.tracker.next_event().await
    }

    /// Applies a finished request. Returns a report when a new route is displayed.
    pub fn apply(&mut self, completion: RouteCompletion) -> Option<RouteReport> {
        let tag = completion.tag();
        if !self.is_current(tag) {
            debug!("Discarding stale route response {:?} (epoch {})", tag, self.epoch);
            return None;
        }
        self.applied_seq = tag.seq;

        match completion {
            RouteCompletion::Static {
                origin_text,
                destination_text,
                origin,
                destination,
                route,
                ..
            } => {
                let origin_waypoint = origin
                    .as_ref()
                    .ok()
                    .map(|c| Waypoint::new(*c, origin_text.trim(), WaypointRole::Origin));
                let destination_waypoint = destination
                    .as_ref()
                    .ok()
                    .map(|c| Waypoint::new(*c, destination_text.trim(), WaypointRole::Destination));
                self.display.set_endpoints(origin_waypoint, destination_waypoint);

                match route {
                    Some(Ok(result)) => {
                        self.last_error = None;
                        let report = self.display.show_route(result, RouteMode::Static);
                        info!("Static route: {} / {}", report.distance_label, report.duration_label);
                        Some(report)
                    }
                    Some(Err(err)) => {
                        self.last_error = Some(err.to_string());
                        self.display.fail_keeping_route();
                        None
                    }
                    None => {
                        self.last_error = origin.err().or(destination.err()).map(|err| err.to_string());
                        self.display.fail_without_route();
                        None
                    }
                }
            }
            RouteCompletion::Live { destination, route, .. } => {
                match &destination {
                    Ok(coordinate) => self.tracker.cache_destination(*coordinate),
                    Err(err) => warn!("Live refresh skipped: {}", err),
                }

                match route {
                    Some(Ok(result)) => {
                        self.last_error = None;
                        let report = self.display.show_route(result, RouteMode::Live);
                        debug!("Live route: {} / {}", report.distance_label, report.duration_label);
                        Some(report)
                    }
                    Some(Err(err)) => {
                        warn!("Live route refresh failed: {}", err);
                        self.last_error = Some(err.to_string());
                        None
                    }
                    None => {
                        self.last_error = destination.err().map(|err| err.to_string());
                        None
                    }
                }
            }
        }
    }

    /// Cancels the position watch and drops every pending response.
    pub fn teardown(&mut self) {
        self.tracker.stop();
        self.epoch += 1;
    }

    pub fn snapshot(&self) -> RouteViewSnapshot {
        let tracking = self.tracker.is_tracking();
        RouteViewSnapshot {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            phase: self.display.phase(),
            loading: self.display.is_loading() && !tracking,
            tracking,
            live_position: self.tracker.live_position(),
            endpoints: self.display.endpoints().to_vec(),
            route: self.display.route().cloned(),
            bounds: self.map_bounds(),
            last_error: self.last_error.clone(),
        }
    }

    /// Live position and destination while tracking, otherwise the endpoints and the whole route.
    fn map_bounds(&self) -> Option<Bounds> {
        if let (Some(fix), Some(destination)) = (self.tracker.live_position(), self.display.destination_waypoint()) {
            return Bounds::around([fix.coordinate, destination.coordinate], MAP_BOUNDS_PADDING);
        }

        let endpoints = self.display.endpoints().iter().map(|waypoint| waypoint.coordinate);
        let path = self
            .display
            .route()
            .into_iter()
            .flat_map(|route| route.geometry.points().iter().copied());
        Bounds::around(endpoints.chain(path), MAP_BOUNDS_PADDING)
    }
}
