use chrono::{DateTime, TimeDelta, Utc};
use road_trip_lib::Coordinate;
use tracing::{debug, info};

use crate::{
    error::NavigationError,
    position::{PositionEvent, PositionFix, PositionSource, PositionSubscription},
};

/// Minimum time between two route fetches triggered by position fixes.
pub const ROUTE_REFRESH_INTERVAL_SECS: i64 = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingSession {
    pub last_fix: Option<PositionFix>,
    pub last_route_refresh_at: Option<DateTime<Utc>>,
    /// Resolved once, reused for every refresh
    pub destination: Option<Coordinate>,
}

impl TrackingSession {
    pub fn is_refresh_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_route_refresh_at {
            None => true,
            Some(last) => now - last >= TimeDelta::seconds(ROUTE_REFRESH_INTERVAL_SECS),
        }
    }
}

/// A route fetch from the live position, decided by the throttle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshRequest {
    pub from: Coordinate,
    pub cached_destination: Option<Coordinate>,
}

#[derive(Default)]
pub struct GpsTracker {
    session: Option<TrackingSession>,
    subscription: Option<PositionSubscription>,
}

impl GpsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&TrackingSession> {
        self.session.as_ref()
    }

    pub fn live_position(&self) -> Option<PositionFix> {
        self.session.as_ref().and_then(|session| session.last_fix)
    }

    pub fn start(&mut self, source: &dyn PositionSource, cached_destination: Option<Coordinate>) -> Result<(), NavigationError> {
        if self.is_tracking() {
            return Err(NavigationError::AlreadyTracking);
        }

        let subscription = source.subscribe()?;
        self.subscription = Some(subscription);
        self.session = Some(TrackingSession {
            destination: cached_destination,
            ..Default::default()
        });

        info!("GPS tracking started");
        Ok(())
    }

    /// Cancels the position watch and clears the session. Returns false if it was not running.
    pub fn stop(&mut self) -> bool {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }

        let was_tracking = self.session.take().is_some();
        if was_tracking {
            info!("GPS tracking stopped");
        }
        was_tracking
    }

    /// The fix always moves the live position. A refresh is only requested when the throttle allows.
    pub fn on_fix(&mut self, fix: PositionFix, destination_text: &str, now: DateTime<Utc>) -> Option<RefreshRequest> {
        let session = self.session.as_mut()?;
        session.last_fix = Some(fix);

        if destination_text.trim().is_empty() {
            return None;
        }

        if !session.is_refresh_due(now) {
            debug!("Route refresh throttled");
            return None;
        }

        session.last_route_refresh_at = Some(now);
        Some(RefreshRequest {
            from: fix.coordinate,
            cached_destination: session.destination,
        })
    }

    pub fn cache_destination(&mut self, destination: Coordinate) {
        if let Some(session) = self.session.as_mut() {
            session.destination = Some(destination);
        }
    }

    pub fn forget_destination(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.destination = None;
        }
    }

    /// Waits for the next device event. Never resolves while stopped.
    pub async fn next_event(&mut self) -> PositionEvent {
        match self.subscription.as_mut() {
            Some(subscription) => match subscription.next().await {
                Some(event) => event,
                None => PositionEvent::Error("Position source closed".to_string()),
            },
            None => std::future::pending().await,
        }
    }
}
