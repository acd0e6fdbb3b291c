use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// A WGS84 position in (latitude, longitude) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a coordinate from a pair in (longitude, latitude) order, as routing services return them.
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lng: pair[0],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

// geo-types is x = longitude, y = latitude
impl From<Coordinate> for Coord {
    fn from(value: Coordinate) -> Self {
        Coord {
            x: value.lng,
            y: value.lat,
        }
    }
}

impl From<Coord> for Coordinate {
    fn from(value: Coord) -> Self {
        Self {
            lat: value.y,
            lng: value.x,
        }
    }
}

/// The area a map should show, as south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl Bounds {
    /// Smallest box around the coordinates, grown on every side by `pad` times its size.
    pub fn around(coordinates: impl IntoIterator<Item = Coordinate>, pad: f64) -> Option<Self> {
        let mut coords = coordinates.into_iter().map(Coord::from);
        let first = coords.next()?;
        let rect = coords.fold(Rect::new(first, first), |rect, c| {
            Rect::new(
                Coord {
                    x: rect.min().x.min(c.x),
                    y: rect.min().y.min(c.y),
                },
                Coord {
                    x: rect.max().x.max(c.x),
                    y: rect.max().y.max(c.y),
                },
            )
        });

        let margin = Coord {
            x: rect.width() * pad,
            y: rect.height() * pad,
        };
        Some(Self {
            south_west: (rect.min() - margin).into(),
            north_east: (rect.max() + margin).into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaypointRole {
    Origin,
    Destination,
}

/// A named coordinate shown as a route endpoint marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    pub label: String,
    pub role: WaypointRole,
}

impl Waypoint {
    pub fn new(coordinate: Coordinate, label: impl Into<String>, role: WaypointRole) -> Self {
        Self {
            coordinate,
            label: label.into(),
            role,
        }
    }

    /// True if this waypoint was resolved from the given address text.
    pub fn matches_address(&self, address: &str) -> bool {
        let address = address.trim();
        !address.is_empty() && self.label.trim() == address
    }
}
