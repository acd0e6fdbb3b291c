use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use road_trip_routing::{
    NavigationError, PositionEvent, PositionSource, PositionSubscription,
    position::PositionFeed,
};

const SUBSCRIPTION_BUFFER: usize = 32;

struct Device {
    connection_id: u64,
    feeds: Vec<PositionFeed>,
}

/// Connected trackers by trip id, and who is watching them.
#[derive(Clone, Default)]
pub struct DeviceHub {
    devices: Arc<Mutex<HashMap<String, Device>>>,
    next_connection_id: Arc<AtomicU64>,
}

impl DeviceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tracker for the trip. A newer connection replaces an older one.
    pub fn connect(&self, trip_id: &str) -> DeviceConnection {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut devices) = self.devices.lock() {
            let previous = devices.insert(
                trip_id.to_string(),
                Device {
                    connection_id,
                    feeds: Vec::new(),
                },
            );
            if previous.is_some() {
                tracing::warn!("Tracker for trip {} replaced by a new connection", trip_id);
            }
        }

        DeviceConnection {
            hub: self.clone(),
            trip_id: trip_id.to_string(),
            connection_id,
        }
    }

    pub fn is_connected(&self, trip_id: &str) -> bool {
        self.devices.lock().is_ok_and(|devices| devices.contains_key(trip_id))
    }

    pub fn source_for(&self, trip_id: &str) -> Arc<dyn PositionSource> {
        Arc::new(TripPositionSource {
            hub: self.clone(),
            trip_id: trip_id.to_string(),
        })
    }

    fn subscribe(&self, trip_id: &str) -> Result<PositionSubscription, NavigationError> {
        let mut devices = self
            .devices
            .lock()
            .map_err(|_| NavigationError::DeviceLocationError("Device registry unavailable".to_string()))?;
        let device = devices.get_mut(trip_id).ok_or(NavigationError::DeviceLocationUnsupported)?;

        let (feed, subscription) = PositionSubscription::channel(SUBSCRIPTION_BUFFER);
        device.feeds.push(feed);
        Ok(subscription)
    }

    fn feeds(&self, trip_id: &str, connection_id: u64) -> Vec<PositionFeed> {
        let Ok(mut devices) = self.devices.lock() else {
            return Vec::new();
        };
        match devices.get_mut(trip_id) {
            Some(device) if device.connection_id == connection_id => {
                device.feeds.retain(|feed| !feed.is_cancelled());
                device.feeds.clone()
            }
            _ => Vec::new(),
        }
    }

    fn remove(&self, trip_id: &str, connection_id: u64) -> Vec<PositionFeed> {
        let Ok(mut devices) = self.devices.lock() else {
            return Vec::new();
        };
        match devices.get(trip_id) {
            Some(device) if device.connection_id == connection_id => {
                devices.remove(trip_id).map(|device| device.feeds).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }
}

/// The tracker side of a registration. Dropping it without `close` counts as a lost device.
pub struct DeviceConnection {
    hub: DeviceHub,
    trip_id: String,
    connection_id: u64,
}

impl DeviceConnection {
    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Returns the number of watchers that received the event.
    pub async fn publish(&self, event: PositionEvent) -> usize {
        let mut delivered = 0;
        for feed in self.hub.feeds(&self.trip_id, self.connection_id) {
            if feed.publish(event.clone()).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Ends the registration. Watchers are told how it ended before their feeds close.
    pub async fn close(self, error: Option<String>) {
        let feeds = self.hub.remove(&self.trip_id, self.connection_id);
        let event = match error {
            Some(message) => PositionEvent::Error(message),
            None => PositionEvent::Ended,
        };
        for feed in &feeds {
            feed.publish(event.clone()).await;
        }
    }
}

impl Drop for DeviceConnection {
    fn drop(&mut self) {
        // Dropping the feeds closes every subscription
        self.hub.remove(&self.trip_id, self.connection_id);
    }
}

struct TripPositionSource {
    hub: DeviceHub,
    trip_id: String,
}

impl PositionSource for TripPositionSource {
    fn subscribe(&self) -> Result<PositionSubscription, NavigationError> {
        self.hub.subscribe(&self.trip_id)
    }
}
