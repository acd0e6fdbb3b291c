use std::{collections::HashMap, sync::Arc};

use road_trip_data_management::{DataManager, DataManagerError, assistant::Assistant};
use road_trip_routing::{Geocoder, Router, RouteViewHandle, spawn_route_view};
use tokio::sync::Mutex;

use crate::device_hub::DeviceHub;

pub struct ServerState {
    pub data_manager: DataManager,
    pub geocoder: Geocoder,
    pub router: Router,
    pub assistant: Assistant,
    pub devices: DeviceHub,
    /// One route view per trip, started on first use
    views: Mutex<HashMap<String, RouteViewHandle>>,
}

impl ServerState {
    pub fn new(data_manager: DataManager, geocoder: Geocoder, router: Router, assistant: Assistant) -> Self {
        Self {
            data_manager,
            geocoder,
            router,
            assistant,
            devices: DeviceHub::new(),
            views: Mutex::new(HashMap::new()),
        }
    }

    pub async fn route_view(&self, trip_id: &str) -> Result<RouteViewHandle, DataManagerError> {
        self.open_route_view(trip_id).await.map(|(view, _)| view)
    }

    /// Also tells whether this call started the view. A new view already shows the stored route text.
    pub async fn open_route_view(&self, trip_id: &str) -> Result<(RouteViewHandle, bool), DataManagerError> {
        let mut views = self.views.lock().await;
        if let Some(view) = views.get(trip_id) {
            return Ok((view.clone(), false));
        }

        let trip = self.data_manager.trip(trip_id).await?;
        let (view, _task) = spawn_route_view(
            self.geocoder.clone(),
            self.router.clone(),
            self.devices.source_for(trip_id),
            self.data_manager.route_sink(trip_id),
        );

        if view.set_route_text(&trip.details.origin, &trip.details.destination).await.is_err() {
            tracing::error!("Route view for trip {} stopped on startup", trip_id);
        }

        tracing::debug!("Started route view for trip {}", trip_id);
        views.insert(trip_id.to_string(), view.clone());
        Ok((view, true))
    }

    pub async fn close_route_view(&self, trip_id: &str) {
        if let Some(view) = self.views.lock().await.remove(trip_id) {
            let _ = view.shutdown().await;
        }
    }
}
