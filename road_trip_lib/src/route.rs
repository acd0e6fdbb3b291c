use serde::{Deserialize, Serialize};

use crate::{
    coordinate::Coordinate,
    format::{format_distance, format_duration},
};

/// Polyline of a route in (latitude, longitude) order. Replaced wholesale, never edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry(Vec<Coordinate>);

impl RouteGeometry {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub distance_label: String,
    pub duration_label: String,
}

impl RouteSummary {
    /// The labels are always derived from the numeric fields.
    pub fn new(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            distance_meters,
            duration_seconds,
            distance_label: format_distance(distance_meters),
            duration_label: format_duration(duration_seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub road_name: String,
    pub maneuver_type: String,
    pub maneuver_modifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub geometry: RouteGeometry,
    pub summary: RouteSummary,
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteMode {
    /// Origin text to destination text.
    Static,
    /// Live position to destination. Distance is what remains.
    Live,
}

/// What a successful route computation reports to the owning trip record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    pub distance_label: String,
    pub duration_label: String,
    pub duration_seconds: f64,
    pub distance_meters: f64,
    pub mode: RouteMode,
}

impl RouteReport {
    pub fn from_summary(summary: &RouteSummary, mode: RouteMode) -> Self {
        Self {
            distance_label: summary.distance_label.clone(),
            duration_label: summary.duration_label.clone(),
            duration_seconds: summary.duration_seconds,
            distance_meters: summary.distance_meters,
            mode,
        }
    }
}
