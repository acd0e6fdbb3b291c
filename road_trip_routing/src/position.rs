use chrono::{DateTime, Utc};
use road_trip_lib::Coordinate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::NavigationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    pub accuracy_meters: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    pub fn new(coordinate: Coordinate, accuracy_meters: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            accuracy_meters,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Fix(PositionFix),
    /// Reported by the device. Ends the tracking session.
    Error(String),
    /// The device stopped cleanly. Ends the tracking session without an error.
    Ended,
}

/// A continuous position watch. Cancelling closes the channel so producers stop at once.
pub struct PositionSubscription {
    receiver: mpsc::Receiver<PositionEvent>,
}

/// Producer half of a subscription.
#[derive(Clone)]
pub struct PositionFeed {
    sender: mpsc::Sender<PositionEvent>,
}

impl PositionFeed {
    /// Returns false once the subscription is cancelled or gone.
    pub async fn publish(&self, event: PositionEvent) -> bool {
        self.sender.send(event).await.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PositionSubscription {
    pub fn channel(buffer: usize) -> (PositionFeed, PositionSubscription) {
        let (sender, receiver) = mpsc::channel(buffer);
        (PositionFeed { sender }, PositionSubscription { receiver })
    }

    /// None once every producer is gone.
    pub async fn next(&mut self) -> Option<PositionEvent> {
        self.receiver.recv().await
    }

    pub fn cancel(mut self) {
        self.receiver.close();
    }
}

/// Where position fixes come from.
pub trait PositionSource: Send + Sync {
    /// Fails when the device cannot provide locations at all.
    fn subscribe(&self) -> Result<PositionSubscription, NavigationError>;
}
