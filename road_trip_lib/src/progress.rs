use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::trip::TripDetails;

/// Below this many meters remaining the trip counts as arriving.
pub const ARRIVAL_THRESHOLD_METERS: f64 = 1000.;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStatus {
    NotStarted,
    Waiting,
    EnRouteGps,
    Arriving,
    EnRouteScheduled,
    Completed,
    Planned,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripProgress {
    /// 0 to 100
    pub percent: f64,
    pub status: TripStatus,
}

impl TripProgress {
    fn new(percent: f64, status: TripStatus) -> Self {
        Self { percent, status }
    }
}

/// Completion estimate for a trip. GPS distances win over the schedule.
pub fn project(details: &TripDetails, now: DateTime<Utc>) -> TripProgress {
    if let (Some(total), Some(remaining)) = (details.total_distance_value, details.remaining_distance_value) {
        if total > 0. {
            if remaining < ARRIVAL_THRESHOLD_METERS {
                return TripProgress::new(100., TripStatus::Arriving);
            }
            let traveled = total - remaining;
            let percent = (traveled / total * 100.).clamp(0., 100.);
            return TripProgress::new(percent, TripStatus::EnRouteGps);
        }
    }

    if let (Some(start), Some(duration)) = (details.start_date, details.duration_value) {
        let duration_ms = (duration * 1000.) as i64;
        if duration_ms > 0 {
            if now < start {
                return TripProgress::new(0., TripStatus::Waiting);
            }

            // An end beyond the calendar range is never reached
            let end = TimeDelta::try_milliseconds(duration_ms).and_then(|delta| start.checked_add_signed(delta));
            if end.is_some_and(|end| now > end) {
                return TripProgress::new(100., TripStatus::Completed);
            }

            let elapsed = (now - start).num_milliseconds() as f64;
            let percent = (elapsed / duration_ms as f64 * 100.).clamp(0., 100.);
            return TripProgress::new(percent, TripStatus::EnRouteScheduled);
        }
    }

    if details.distance.is_some() {
        return TripProgress::new(0., TripStatus::Planned);
    }

    TripProgress::new(0., TripStatus::NotStarted)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Time left until the target, all zero once it has passed.
pub fn countdown(target: DateTime<Utc>, now: DateTime<Utc>) -> Countdown {
    let left = target - now;
    if left <= TimeDelta::zero() {
        return Countdown::default();
    }

    let total = left.num_seconds();
    Countdown {
        days: total / 86_400,
        hours: (total / 3600) % 24,
        minutes: (total / 60) % 60,
        seconds: total % 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gps(total: f64, remaining: f64) -> TripDetails {
        TripDetails {
            total_distance_value: Some(total),
            remaining_distance_value: Some(remaining),
            ..Default::default()
        }
    }

    fn scheduled(start: DateTime<Utc>, duration: f64) -> TripDetails {
        TripDetails {
            start_date: Some(start),
            duration_value: Some(duration),
            ..Default::default()
        }
    }

    #[test]
    fn gps_progress() {
        let now = Utc::now();
        assert_eq!(project(&gps(1000., 1000.), now), TripProgress::new(0., TripStatus::EnRouteGps));
        assert_eq!(project(&gps(500_000., 900.), now), TripProgress::new(100., TripStatus::Arriving));
        assert_eq!(project(&gps(1000., 999.), now), TripProgress::new(100., TripStatus::Arriving));
        assert_eq!(project(&gps(400_000., 100_000.), now), TripProgress::new(75., TripStatus::EnRouteGps));
    }

    #[test]
    fn gps_progress_is_clamped() {
        // Rerouting can make the remaining distance exceed the baseline
        let progress = project(&gps(100_000., 150_000.), Utc::now());
        assert_eq!(progress, TripProgress::new(0., TripStatus::EnRouteGps));
    }

    #[test]
    fn zero_total_falls_through_to_schedule() {
        let now = Utc::now();
        let details = TripDetails {
            total_distance_value: Some(0.),
            remaining_distance_value: Some(5000.),
            start_date: Some(now - TimeDelta::hours(2)),
            duration_value: Some(3600.),
            ..Default::default()
        };
        assert_eq!(project(&details, now).status, TripStatus::Completed);
    }

    #[test]
    fn scheduled_progress() {
        let now = Utc::now();

        let waiting = project(&scheduled(now + TimeDelta::hours(1), 3600.), now);
        assert_eq!(waiting, TripProgress::new(0., TripStatus::Waiting));

        let at_start = project(&scheduled(now, 3600.), now);
        assert_eq!(at_start, TripProgress::new(0., TripStatus::EnRouteScheduled));

        let halfway = project(&scheduled(now - TimeDelta::minutes(30), 3600.), now);
        assert_eq!(halfway.status, TripStatus::EnRouteScheduled);
        assert!((halfway.percent - 50.).abs() < 1e-9);

        let done = project(&scheduled(now - TimeDelta::hours(2), 3600.), now);
        assert_eq!(done, TripProgress::new(100., TripStatus::Completed));
    }

    #[test]
    fn scheduled_end_is_still_en_route() {
        let now = Utc::now();
        let at_end = project(&scheduled(now - TimeDelta::hours(1), 3600.), now);
        assert_eq!(at_end, TripProgress::new(100., TripStatus::EnRouteScheduled));
    }

    #[test]
    fn huge_duration_stays_in_range() {
        let start = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let now = start + TimeDelta::hours(1);

        for duration in [1e13, 1e300, f64::INFINITY] {
            let progress = project(&scheduled(start, duration), now);
            assert_eq!(progress.status, TripStatus::EnRouteScheduled);
            assert!((0. ..=100.).contains(&progress.percent), "{duration}: {progress:?}");
        }
    }

    #[test]
    fn sub_millisecond_duration_counts_as_unset() {
        let now = Utc::now();
        assert_eq!(project(&scheduled(now, 0.0004), now), TripProgress::new(0., TripStatus::NotStarted));
        assert_eq!(project(&scheduled(now, f64::NAN), now), TripProgress::new(0., TripStatus::NotStarted));
        assert_eq!(project(&scheduled(now, -60.), now), TripProgress::new(0., TripStatus::NotStarted));
    }

    #[test]
    fn planned_and_not_started() {
        let now = Utc::now();
        let planned = TripDetails {
            distance: Some("12.0 km".into()),
            ..Default::default()
        };
        assert_eq!(project(&planned, now), TripProgress::new(0., TripStatus::Planned));
        assert_eq!(project(&TripDetails::default(), now), TripProgress::new(0., TripStatus::NotStarted));
    }

    #[test]
    fn countdown_breakdown() {
        let now = Utc::now();
        let target = now + TimeDelta::days(2) + TimeDelta::hours(3) + TimeDelta::minutes(4) + TimeDelta::seconds(5);
        assert_eq!(
            countdown(target, now),
            Countdown {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5
            }
        );
        assert_eq!(countdown(now - TimeDelta::seconds(1), now), Countdown::default());
    }
}
