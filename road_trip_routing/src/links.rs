use reqwest::Url;
use road_trip_lib::Coordinate;

pub const GOOGLE_MAPS_DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/";

/// Directions link for an external navigation app.
/// Starts at the live position when there is one. Needs both addresses.
pub fn external_directions_url(origin: &str, destination: &str, live_position: Option<Coordinate>) -> Option<Url> {
    let (origin, destination) = (origin.trim(), destination.trim());
    if origin.is_empty() || destination.is_empty() {
        return None;
    }

    let start = match live_position {
        Some(position) => format!("{},{}", position.lat, position.lng),
        None => origin.to_string(),
    };

    Url::parse_with_params(
        GOOGLE_MAPS_DIRECTIONS_URL,
        &[("api", "1"), ("origin", start.as_str()), ("destination", destination)],
    )
    .ok()
}
