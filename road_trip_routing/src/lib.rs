pub mod actor;
pub mod display;
pub mod error;
pub mod geocoder;
pub mod links;
pub mod nominatim;
pub mod osrm;
pub mod position;
pub mod router;
pub mod services;
pub mod tracker;
pub mod view;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use actor::{RouteReportSink, RouteViewHandle, spawn_route_view};
pub use error::{NavigationError, ServiceError};
pub use geocoder::Geocoder;
pub use links::external_directions_url;
pub use position::{PositionEvent, PositionFix, PositionSource, PositionSubscription};
pub use router::Router;
pub use view::{RouteView, RouteViewSnapshot};
