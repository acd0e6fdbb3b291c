use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{coordinate::Coordinate, route::RouteReport};

pub const DEFAULT_MARKER_LABEL: &str = "My location";

fn new_id(now: DateTime<Utc>) -> String {
    format!("{}{:08x}", now.timestamp_millis(), rand::random::<u32>())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TripDetails {
    pub origin: String,
    pub destination: String,
    pub start_date: Option<DateTime<Utc>>,
    pub notes: String,

    /// Formatted, e.g. "520.0 km"
    pub distance: Option<String>,
    /// Formatted, e.g. "6h 30min"
    pub duration: Option<String>,
    /// Seconds
    pub duration_value: Option<f64>,

    /// Meters. Set by the first successful route calculation only.
    pub total_distance_value: Option<f64>,
    /// Meters. Overwritten by every successful route calculation.
    pub remaining_distance_value: Option<f64>,
    pub last_gps_update: Option<DateTime<Utc>>,
}

impl TripDetails {
    pub fn has_distance_baseline(&self) -> bool {
        self.total_distance_value.is_some_and(|total| total > 0.)
    }

    pub fn apply_route_report(&mut self, report: &RouteReport, now: DateTime<Utc>) {
        if !self.has_distance_baseline() {
            self.total_distance_value = Some(report.distance_meters);
        }

        self.distance = Some(report.distance_label.clone());
        self.duration = Some(report.duration_label.clone());
        self.duration_value = Some(report.duration_seconds);
        self.remaining_distance_value = Some(report.distance_meters);
        self.last_gps_update = Some(now);
    }

    /// Lets the next route calculation establish a new total distance.
    pub fn clear_distance_baseline(&mut self) {
        self.total_distance_value = None;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    pub is_completed: bool,
    pub category: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpenseCategory {
    Fuel,
    Food,
    Lodging,
    Toll,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 5] = [
        ExpenseCategory::Fuel,
        ExpenseCategory::Food,
        ExpenseCategory::Lodging,
        ExpenseCategory::Toll,
        ExpenseCategory::Other,
    ];
}

impl FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fuel" => Ok(ExpenseCategory::Fuel),
            "food" => Ok(ExpenseCategory::Food),
            "lodging" => Ok(ExpenseCategory::Lodging),
            "toll" => Ok(ExpenseCategory::Toll),
            "other" => Ok(ExpenseCategory::Other),
            other => Err(format!("Unknown expense category '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub category: ExpenseCategory,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MapMarker {
    pub id: String,
    pub coordinate: Coordinate,
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Trip {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub details: TripDetails,
    pub checklist: Vec<ChecklistItem>,
    pub expenses: Vec<Expense>,
    pub markers: Vec<MapMarker>,
}

impl Trip {
    pub fn new(id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            details: TripDetails::default(),
            checklist: Vec::new(),
            expenses: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn add_checklist_item(&mut self, text: &str, category: &str, now: DateTime<Utc>) -> Option<&ChecklistItem> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.checklist.push(ChecklistItem {
            id: new_id(now),
            text: text.to_string(),
            is_completed: false,
            category: category.trim().to_string(),
        });
        self.checklist.last()
    }

    /// Adds suggested items, skipping texts that are already on the list. Returns how many were added.
    pub fn add_checklist_suggestions(&mut self, suggestions: &[(String, String)], now: DateTime<Utc>) -> usize {
        let mut added = 0;
        for (text, category) in suggestions {
            let exists = self
                .checklist
                .iter()
                .any(|item| item.text.to_lowercase() == text.trim().to_lowercase());
            if exists {
                continue;
            }
            if self.add_checklist_item(text, category, now).is_some() {
                added += 1;
            }
        }
        added
    }

    pub fn toggle_checklist_item(&mut self, item_id: &str) -> Option<bool> {
        let item = self.checklist.iter_mut().find(|item| item.id == item_id)?;
        item.is_completed = !item.is_completed;
        Some(item.is_completed)
    }

    pub fn remove_checklist_item(&mut self, item_id: &str) -> bool {
        let before = self.checklist.len();
        self.checklist.retain(|item| item.id != item_id);
        before != self.checklist.len()
    }

    /// (completed, total)
    pub fn checklist_completion(&self) -> (usize, usize) {
        let completed = self.checklist.iter().filter(|item| item.is_completed).count();
        (completed, self.checklist.len())
    }

    pub fn checklist_percent(&self) -> f64 {
        match self.checklist_completion() {
            (_, 0) => 0.,
            (completed, total) => completed as f64 / total as f64 * 100.,
        }
    }

    pub fn add_expense(
        &mut self,
        description: &str,
        amount: f64,
        category: ExpenseCategory,
        now: DateTime<Utc>,
    ) -> Option<&Expense> {
        if !amount.is_finite() || amount <= 0. || description.trim().is_empty() {
            return None;
        }

        self.expenses.push(Expense {
            id: new_id(now),
            description: description.trim().to_string(),
            amount,
            category,
            date: now,
        });
        self.expenses.last()
    }

    pub fn remove_expense(&mut self, expense_id: &str) -> bool {
        let before = self.expenses.len();
        self.expenses.retain(|expense| expense.id != expense_id);
        before != self.expenses.len()
    }

    pub fn expense_total(&self) -> f64 {
        self.expenses.iter().map(|expense| expense.amount).sum()
    }

    pub fn expense_totals_by_category(&self) -> Vec<(ExpenseCategory, f64)> {
        ExpenseCategory::ALL
            .iter()
            .map(|&category| {
                let total = self
                    .expenses
                    .iter()
                    .filter(|expense| expense.category == category)
                    .map(|expense| expense.amount)
                    .sum::<f64>();
                (category, total)
            })
            .collect()
    }

    pub fn add_marker(&mut self, coordinate: Coordinate, label: &str, now: DateTime<Utc>) -> &MapMarker {
        let label = match label.trim() {
            "" => DEFAULT_MARKER_LABEL,
            label => label,
        };
        self.markers.push(MapMarker {
            id: new_id(now),
            coordinate,
            label: label.to_string(),
        });
        &self.markers[self.markers.len() - 1]
    }

    pub fn remove_marker(&mut self, marker_id: &str) -> bool {
        let before = self.markers.len();
        self.markers.retain(|marker| marker.id != marker_id);
        before != self.markers.len()
    }
}

/// Everything stored for one user. This is the document that gets synchronized.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AppData {
    pub trips: Vec<Trip>,
    pub active_trip_id: Option<String>,
}

impl AppData {
    /// New trips go first and become active.
    pub fn create_trip(&mut self, now: DateTime<Utc>) -> &mut Trip {
        let trip = Trip::new(new_id(now), now);
        self.active_trip_id = Some(trip.id.clone());
        self.trips.insert(0, trip);
        &mut self.trips[0]
    }

    pub fn delete_trip(&mut self, trip_id: &str) -> bool {
        let before = self.trips.len();
        self.trips.retain(|trip| trip.id != trip_id);

        if self.active_trip_id.as_deref() == Some(trip_id) {
            self.active_trip_id = None;
        }

        before != self.trips.len()
    }

    pub fn select_trip(&mut self, trip_id: &str) -> bool {
        if self.trip(trip_id).is_none() {
            return false;
        }
        self.active_trip_id = Some(trip_id.to_string());
        true
    }

    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.id == trip_id)
    }

    pub fn trip_mut(&mut self, trip_id: &str) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|trip| trip.id == trip_id)
    }

    pub fn active_trip(&self) -> Option<&Trip> {
        self.active_trip_id.as_deref().and_then(|id| self.trip(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteMode, RouteReport, RouteSummary};

    fn report(distance: f64, mode: RouteMode) -> RouteReport {
        RouteReport::from_summary(&RouteSummary::new(distance, 3600.), mode)
    }

    #[test]
    fn first_report_sets_total_distance() {
        let mut details = TripDetails::default();
        let now = Utc::now();
        details.apply_route_report(&report(420_000., RouteMode::Static), now);

        assert_eq!(details.total_distance_value, Some(420_000.));
        assert_eq!(details.remaining_distance_value, Some(420_000.));
        assert_eq!(details.distance.as_deref(), Some("420.0 km"));
        assert_eq!(details.duration.as_deref(), Some("1h 0min"));
        assert_eq!(details.duration_value, Some(3600.));
        assert_eq!(details.last_gps_update, Some(now));
    }

    #[test]
    fn total_distance_is_write_once() {
        let mut details = TripDetails {
            total_distance_value: Some(500_000.),
            ..Default::default()
        };

        details.apply_route_report(&report(600_000., RouteMode::Static), Utc::now());
        assert_eq!(details.total_distance_value, Some(500_000.));
        assert_eq!(details.remaining_distance_value, Some(600_000.));

        details.apply_route_report(&report(120_000., RouteMode::Live), Utc::now());
        assert_eq!(details.total_distance_value, Some(500_000.));
        assert_eq!(details.remaining_distance_value, Some(120_000.));
    }

    #[test]
    fn cleared_baseline_is_set_again() {
        let mut details = TripDetails {
            total_distance_value: Some(500_000.),
            ..Default::default()
        };
        details.clear_distance_baseline();
        details.apply_route_report(&report(600_000., RouteMode::Static), Utc::now());
        assert_eq!(details.total_distance_value, Some(600_000.));
    }

    #[test]
    fn trips_are_created_first_and_active() {
        let mut data = AppData::default();
        let now = Utc::now();
        let first = data.create_trip(now).id.clone();
        let second = data.create_trip(now).id.clone();

        assert_ne!(first, second);
        assert_eq!(data.trips[0].id, second);
        assert_eq!(data.active_trip_id.as_deref(), Some(second.as_str()));

        assert!(data.select_trip(&first));
        assert!(data.delete_trip(&first));
        assert_eq!(data.active_trip_id, None);
        assert!(!data.select_trip(&first));
        assert_eq!(data.trips.len(), 1);
    }

    #[test]
    fn checklist_operations() {
        let mut trip = Trip::new("t".into(), Utc::now());
        let now = Utc::now();
        assert!(trip.add_checklist_item("   ", "Docs", now).is_none());
        let id = trip.add_checklist_item(" Passport ", "Docs", now).unwrap().id.clone();
        trip.add_checklist_item("Charger", "Electronics", now);

        assert_eq!(trip.toggle_checklist_item(&id), Some(true));
        assert_eq!(trip.checklist_completion(), (1, 2));
        assert_eq!(trip.checklist_percent(), 50.);

        let suggestions = vec![
            ("passport".to_string(), "Docs".to_string()),
            ("Sunscreen".to_string(), "Hygiene".to_string()),
        ];
        assert_eq!(trip.add_checklist_suggestions(&suggestions, now), 1);
        assert_eq!(trip.checklist.len(), 3);

        assert!(trip.remove_checklist_item(&id));
        assert!(!trip.remove_checklist_item(&id));
    }

    #[test]
    fn expense_totals() {
        let mut trip = Trip::new("t".into(), Utc::now());
        let now = Utc::now();
        trip.add_expense("Gas", 200., ExpenseCategory::Fuel, now);
        trip.add_expense("Toll", 12.5, ExpenseCategory::Toll, now);
        trip.add_expense("More gas", 100., ExpenseCategory::Fuel, now);
        assert!(trip.add_expense("Free", 0., ExpenseCategory::Other, now).is_none());
        assert!(trip.add_expense("Broken", f64::NAN, ExpenseCategory::Other, now).is_none());

        assert_eq!(trip.expense_total(), 312.5);
        let by_category = trip.expense_totals_by_category();
        assert_eq!(by_category[0], (ExpenseCategory::Fuel, 300.));
        assert_eq!(by_category[3], (ExpenseCategory::Toll, 12.5));
        assert_eq!(by_category[4], (ExpenseCategory::Other, 0.));
    }

    #[test]
    fn expense_category_from_text() {
        assert_eq!(" Lodging ".parse::<ExpenseCategory>(), Ok(ExpenseCategory::Lodging));
        assert_eq!("TOLL".parse::<ExpenseCategory>(), Ok(ExpenseCategory::Toll));
        assert!("snacks".parse::<ExpenseCategory>().is_err());
    }

    #[test]
    fn markers_get_default_label() {
        let mut trip = Trip::new("t".into(), Utc::now());
        let id = trip.add_marker(Coordinate::new(1., 2.), "", Utc::now()).id.clone();
        assert_eq!(trip.markers[0].label, DEFAULT_MARKER_LABEL);
        assert!(trip.remove_marker(&id));
    }

    #[test]
    fn app_data_json_round_trip() {
        let mut data = AppData::default();
        data.create_trip(Utc::now()).details.destination = "Gramado".into();
        let json = serde_json::to_string(&data).unwrap();
        let back: AppData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }
}
