use road_trip_lib::{RouteGeometry, RouteMode, RouteReport, RouteResult, RouteStep, RouteSummary, Waypoint, WaypointRole};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayPhase {
    Idle,
    Resolving,
    Ready,
    /// Shown like Idle
    Failed,
}

/// Geometry and summary always change together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayedRoute {
    pub geometry: RouteGeometry,
    pub summary: RouteSummary,
    pub steps: Vec<RouteStep>,
    pub mode: RouteMode,
}

#[derive(Debug, Clone)]
pub struct RouteDisplay {
    phase: DisplayPhase,
    endpoints: Vec<Waypoint>,
    route: Option<DisplayedRoute>,
}

impl Default for RouteDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteDisplay {
    pub fn new() -> Self {
        Self {
            phase: DisplayPhase::Idle,
            endpoints: Vec::new(),
            route: None,
        }
    }

    pub fn phase(&self) -> DisplayPhase {
        self.phase
    }

    /// The previous route stays visible while resolving.
    pub fn is_loading(&self) -> bool {
        self.phase == DisplayPhase::Resolving
    }

    pub fn endpoints(&self) -> &[Waypoint] {
        &self.endpoints
    }

    pub fn route(&self) -> Option<&DisplayedRoute> {
        self.route.as_ref()
    }

    pub fn destination_waypoint(&self) -> Option<&Waypoint> {
        self.endpoints.iter().find(|w| w.role == WaypointRole::Destination)
    }

    pub fn begin_resolving(&mut self) {
        self.phase = DisplayPhase::Resolving;
    }

    /// Origin first, destination last. Either may be missing.
    pub fn set_endpoints(&mut self, origin: Option<Waypoint>, destination: Option<Waypoint>) {
        self.endpoints = origin.into_iter().chain(destination).collect();
    }

    pub fn show_route(&mut self, result: RouteResult, mode: RouteMode) -> RouteReport {
        let report = RouteReport::from_summary(&result.summary, mode);
        self.route = Some(DisplayedRoute {
            geometry: result.geometry,
            summary: result.summary,
            steps: result.steps,
            mode,
        });
        self.phase = DisplayPhase::Ready;
        report
    }

    /// Endpoints could not be resolved, so no route between them can be shown.
    pub fn fail_without_route(&mut self) {
        self.route = None;
        self.phase = DisplayPhase::Failed;
    }

    /// Routing failed. The last good route stays on screen.
    pub fn fail_keeping_route(&mut self) {
        self.phase = DisplayPhase::Failed;
    }

    pub fn reset(&mut self) {
        self.phase = DisplayPhase::Idle;
        self.endpoints.clear();
        self.route = None;
    }
}

#[cfg(test)]
mod tests {
    use road_trip_lib::Coordinate;

    use super::*;

    fn result(distance: f64) -> RouteResult {
        RouteResult {
            geometry: RouteGeometry::new(vec![Coordinate::new(1., 2.), Coordinate::new(3., 4.)]),
            summary: RouteSummary::new(distance, 600.),
            steps: Vec::new(),
        }
    }

    #[test]
    fn resolving_keeps_previous_route() {
        let mut display = RouteDisplay::new();
        display.show_route(result(1000.), RouteMode::Static);
        display.begin_resolving();

        assert!(display.is_loading());
        assert_eq!(display.route().unwrap().summary.distance_meters, 1000.);
    }

    #[test]
    fn routing_failure_keeps_last_route() {
        let mut display = RouteDisplay::new();
        display.show_route(result(1000.), RouteMode::Static);
        display.begin_resolving();
        display.fail_keeping_route();

        assert_eq!(display.phase(), DisplayPhase::Failed);
        assert!(display.route().is_some());

        display.fail_without_route();
        assert!(display.route().is_none());
    }

    #[test]
    fn endpoints_are_ordered() {
        let mut display = RouteDisplay::new();
        let origin = Waypoint::new(Coordinate::new(1., 1.), "A", WaypointRole::Origin);
        let destination = Waypoint::new(Coordinate::new(2., 2.), "B", WaypointRole::Destination);

        display.set_endpoints(Some(origin.clone()), Some(destination.clone()));
        assert_eq!(display.endpoints(), &[origin, destination.clone()]);

        display.set_endpoints(None, Some(destination.clone()));
        assert_eq!(display.endpoints(), &[destination.clone()]);
        assert_eq!(display.destination_waypoint(), Some(&destination));
    }

    #[test]
    fn show_route_reports_summary() {
        let mut display = RouteDisplay::new();
        let report = display.show_route(result(123456.), RouteMode::Live);

        assert_eq!(display.phase(), DisplayPhase::Ready);
        assert_eq!(report.distance_label, "123.5 km");
        assert_eq!(report.mode, RouteMode::Live);
        assert_eq!(display.route().unwrap().mode, RouteMode::Live);
    }
}
