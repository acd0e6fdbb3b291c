pub mod coordinate;
pub mod format;
pub mod progress;
pub mod route;
pub mod trip;

pub use coordinate::{Bounds, Coordinate, Waypoint, WaypointRole};
pub use route::{RouteGeometry, RouteMode, RouteReport, RouteResult, RouteStep, RouteSummary};
