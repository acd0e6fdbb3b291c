use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use road_trip_lib::{
    Coordinate, RouteReport,
    progress::{self, TripProgress},
    trip::{AppData, ChecklistItem, Expense, ExpenseCategory, MapMarker, Trip, TripDetails},
};
use road_trip_routing::RouteReportSink;
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{
    DataManagerError,
    assistant::ChecklistSuggestion,
    cache::LocalCache,
    config::AppConfig,
    database::{DocumentStore, db::SqliteDocumentStore},
};

/// Quiet time after the last change before an automatic save.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_secs(2);

struct Inner {
    data: RwLock<AppData>,
    cache: LocalCache,
    store: Option<Arc<dyn DocumentStore>>,
    user_id: String,
    dirty: mpsc::Sender<()>,
    dirty_receiver: Mutex<Option<mpsc::Receiver<()>>>,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
    saving: tokio::sync::Mutex<()>,
}

/// The public interface for all trip data. Cheap to clone.
#[derive(Clone)]
pub struct DataManager {
    inner: Arc<Inner>,
}

impl DataManager {
    /// Opens the local cache and the document store from the config, syncs, and starts autosaving.
    pub async fn start(config: &AppConfig) -> Result<Self, DataManagerError> {
        if !config.data_dir.exists() {
            tokio::fs::create_dir_all(&config.data_dir).await
                .map_err(|_| DataManagerError::Cache(format!("Failed to create data directory: {:?}", config.data_dir)))?;
        }

        let store: Option<Arc<dyn DocumentStore>> = if config.cloud_sync {
            match SqliteDocumentStore::connect(&config.database_path()).await {
                Ok(store) => Some(Arc::new(store)),
                Err(err) => {
                    warn!("Document store unavailable, running offline: {}", err);
                    None
                }
            }
        } else {
            info!("Cloud sync disabled");
            None
        };

        let manager = Self::open(LocalCache::in_dir(&config.data_dir), store, &config.user_id).await;
        manager.start_autosave(AUTOSAVE_DEBOUNCE);
        Ok(manager)
    }

    /// Loads the local copy and reconciles it with the store. Never fails; problems leave the app offline.
    pub async fn open(cache: LocalCache, store: Option<Arc<dyn DocumentStore>>, user_id: &str) -> Self {
        let local = match cache.load().await {
            Ok(local) => local,
            Err(err) => {
                warn!("Ignoring unreadable local cache: {}", err);
                None
            }
        };

        let data = synchronize(&cache, store.as_deref(), user_id, local).await;
        info!("Loaded {} trips for {}", data.trips.len(), user_id);

        let (dirty, dirty_receiver) = mpsc::channel(1);
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(data),
                cache,
                store,
                user_id: user_id.to_string(),
                dirty,
                dirty_receiver: Mutex::new(Some(dirty_receiver)),
                last_saved_at: Mutex::new(None),
                saving: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Saves after `debounce` without changes. Only the first call starts a task.
    pub fn start_autosave(&self, debounce: Duration) -> Option<JoinHandle<()>> {
        let receiver = self.inner.dirty_receiver.lock().ok()?.take()?;
        let inner = Arc::downgrade(&self.inner);
        Some(tokio::spawn(autosave(inner, receiver, debounce)))
    }

    /// Local cache always, the store when there is one. Store failures are only logged.
    pub async fn save_now(&self) -> Result<(), DataManagerError> {
        // The snapshot is taken inside the lock so the last write is the newest
        let _saving = self.inner.saving.lock().await;
        let data = self.inner.data.read().await.clone();

        self.inner.cache.save(&data).await?;

        if let Some(store) = &self.inner.store {
            if let Err(err) = store.save(&self.inner.user_id, &data).await {
                warn!("Cloud save failed, kept local copy: {}", err);
            }
        }

        if let Ok(mut last_saved_at) = self.inner.last_saved_at.lock() {
            *last_saved_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.inner.last_saved_at.lock().ok().and_then(|last| *last)
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    fn mark_dirty(&self) {
        // A full channel already means a save is pending
        let _ = self.inner.dirty.try_send(());
    }

    async fn read<R>(&self, f: impl FnOnce(&AppData) -> R) -> R {
        f(&*self.inner.data.read().await)
    }

    async fn update<R>(&self, f: impl FnOnce(&mut AppData) -> R) -> R {
        let result = f(&mut *self.inner.data.write().await);
        self.mark_dirty();
        result
    }

    async fn update_trip<R>(&self, trip_id: &str, f: impl FnOnce(&mut Trip) -> R) -> Result<R, DataManagerError> {
        let result = {
            let mut data = self.inner.data.write().await;
            let trip = data.trip_mut(trip_id).ok_or_else(|| not_found(trip_id))?;
            f(trip)
        };
        self.mark_dirty();
        Ok(result)
    }

    pub async fn snapshot(&self) -> AppData {
        self.read(|data| data.clone()).await
    }

    pub async fn trips(&self) -> Vec<Trip> {
        self.read(|data| data.trips.clone()).await
    }

    pub async fn trip(&self, trip_id: &str) -> Result<Trip, DataManagerError> {
        self.read(|data| data.trip(trip_id).cloned()).await.ok_or_else(|| not_found(trip_id))
    }

    pub async fn active_trip(&self) -> Option<Trip> {
        self.read(|data| data.active_trip().cloned()).await
    }

    pub async fn create_trip(&self) -> Trip {
        self.update(|data| data.create_trip(Utc::now()).clone()).await
    }

    pub async fn delete_trip(&self, trip_id: &str) -> Result<(), DataManagerError> {
        if self.update(|data| data.delete_trip(trip_id)).await {
            Ok(())
        } else {
            Err(not_found(trip_id))
        }
    }

    pub async fn select_trip(&self, trip_id: &str) -> Result<(), DataManagerError> {
        if self.update(|data| data.select_trip(trip_id)).await {
            Ok(())
        } else {
            Err(not_found(trip_id))
        }
    }

    pub async fn set_route_text(&self, trip_id: &str, origin: &str, destination: &str) -> Result<TripDetails, DataManagerError> {
        self.update_trip(trip_id, |trip| {
            trip.details.origin = origin.to_string();
            trip.details.destination = destination.to_string();
            trip.details.clone()
        })
        .await
    }

    pub async fn set_start_date(&self, trip_id: &str, start_date: Option<DateTime<Utc>>) -> Result<(), DataManagerError> {
        self.update_trip(trip_id, |trip| trip.details.start_date = start_date).await
    }

    pub async fn set_notes(&self, trip_id: &str, notes: &str) -> Result<(), DataManagerError> {
        self.update_trip(trip_id, |trip| trip.details.notes = notes.to_string()).await
    }

    pub async fn add_checklist_item(&self, trip_id: &str, text: &str, category: &str) -> Result<Option<ChecklistItem>, DataManagerError> {
        self.update_trip(trip_id, |trip| trip.add_checklist_item(text, category, Utc::now()).cloned()).await
    }

    pub async fn add_checklist_suggestions(&self, trip_id: &str, suggestions: &[ChecklistSuggestion]) -> Result<usize, DataManagerError> {
        let suggestions: Vec<(String, String)> = suggestions
            .iter()
            .map(|suggestion| (suggestion.text.clone(), suggestion.category.clone()))
            .collect();
        self.update_trip(trip_id, |trip| trip.add_checklist_suggestions(&suggestions, Utc::now())).await
    }

    pub async fn toggle_checklist_item(&self, trip_id: &str, item_id: &str) -> Result<bool, DataManagerError> {
        self.update_trip(trip_id, |trip| trip.toggle_checklist_item(item_id)).await?
            .ok_or_else(|| DataManagerError::NotFound(format!("Checklist item {}", item_id)))
    }

    pub async fn remove_checklist_item(&self, trip_id: &str, item_id: &str) -> Result<bool, DataManagerError> {
        self.update_trip(trip_id, |trip| trip.remove_checklist_item(item_id)).await
    }

    pub async fn add_expense(&self, trip_id: &str, description: &str, amount: f64, category: ExpenseCategory) -> Result<Option<Expense>, DataManagerError> {
        self.update_trip(trip_id, |trip| trip.add_expense(description, amount, category, Utc::now()).cloned()).await
    }

    pub async fn remove_expense(&self, trip_id: &str, expense_id: &str) -> Result<bool, DataManagerError> {
        self.update_trip(trip_id, |trip| trip.remove_expense(expense_id)).await
    }

    pub async fn add_marker(&self, trip_id: &str, coordinate: Coordinate, label: &str) -> Result<MapMarker, DataManagerError> {
        self.update_trip(trip_id, |trip| trip.add_marker(coordinate, label, Utc::now()).clone()).await
    }

    pub async fn remove_marker(&self, trip_id: &str, marker_id: &str) -> Result<bool, DataManagerError> {
        self.update_trip(trip_id, |trip| trip.remove_marker(marker_id)).await
    }

    /// Stores the latest route figures. The total distance is only set when there is none.
    pub async fn apply_route_report(&self, trip_id: &str, report: &RouteReport) -> Result<(), DataManagerError> {
        self.update_trip(trip_id, |trip| trip.details.apply_route_report(report, Utc::now())).await
    }

    pub async fn clear_distance_baseline(&self, trip_id: &str) -> Result<(), DataManagerError> {
        self.update_trip(trip_id, |trip| trip.details.clear_distance_baseline()).await
    }

    pub async fn progress(&self, trip_id: &str, now: DateTime<Utc>) -> Result<TripProgress, DataManagerError> {
        self.read(|data| data.trip(trip_id).map(|trip| progress::project(&trip.details, now)))
            .await
            .ok_or_else(|| not_found(trip_id))
    }

    /// Deletes every trip and saves right away.
    pub async fn reset_all(&self) -> Result<(), DataManagerError> {
        *self.inner.data.write().await = AppData::default();
        warn!("All data for {} was reset", self.inner.user_id);
        self.save_now().await
    }

    /// Feeds route reports of a route view into one trip.
    pub fn route_sink(&self, trip_id: &str) -> Arc<dyn RouteReportSink> {
        Arc::new(TripRouteSink {
            manager: self.clone(),
            trip_id: trip_id.to_string(),
        })
    }
}

fn not_found(trip_id: &str) -> DataManagerError {
    DataManagerError::NotFound(format!("Trip {}", trip_id))
}

/// The store wins when it has a document. Otherwise the local one is pushed to it.
async fn synchronize(cache: &LocalCache, store: Option<&dyn DocumentStore>, user_id: &str, local: Option<AppData>) -> AppData {
    let Some(store) = store else {
        return local.unwrap_or_default();
    };

    match store.load(user_id).await {
        Ok(Some(cloud)) => {
            info!("Using cloud document for {}", user_id);
            if let Err(err) = cache.save(&cloud).await {
                warn!("Failed to refresh local cache: {}", err);
            }
            cloud
        }
        Ok(None) => {
            if let Some(local) = &local {
                match store.save(user_id, local).await {
                    Ok(()) => info!("Uploaded local document for {}", user_id),
                    Err(err) => warn!("Failed to upload local document: {}", err),
                }
            }
            local.unwrap_or_default()
        }
        Err(err) => {
            warn!("Sync failed, continuing offline: {}", err);
            local.unwrap_or_default()
        }
    }
}

async fn autosave(inner: Weak<Inner>, mut dirty: mpsc::Receiver<()>, debounce: Duration) {
    while dirty.recv().await.is_some() {
        loop {
            match tokio::time::timeout(debounce, dirty.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        if let Err(err) = (DataManager { inner }).save_now().await {
            error!("Autosave failed: {}", err);
        }
    }
}

struct TripRouteSink {
    manager: DataManager,
    trip_id: String,
}

#[async_trait]
impl RouteReportSink for TripRouteSink {
    async fn report(&self, report: RouteReport) {
        if let Err(err) = self.manager.apply_route_report(&self.trip_id, &report).await {
            warn!("Dropped route report for trip {}: {}", self.trip_id, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use road_trip_lib::{RouteMode, RouteSummary, progress::TripStatus};

    use super::*;
    use crate::{cache::temp_data_dir, database::memory::MemoryDocumentStore};

    fn document(destination: &str) -> AppData {
        let mut data = AppData::default();
        data.create_trip(Utc::now()).details.destination = destination.to_string();
        data
    }

    fn report(distance: f64) -> RouteReport {
        RouteReport::from_summary(&RouteSummary::new(distance, 3600.), RouteMode::Live)
    }

    #[tokio::test]
    async fn cloud_document_wins() {
        let cache = LocalCache::in_dir(&temp_data_dir());
        cache.save(&document("Local")).await.unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        store.save("local", &document("Cloud")).await.unwrap();

        let manager = DataManager::open(cache.clone(), Some(store), "local").await;

        assert_eq!(manager.trips().await[0].details.destination, "Cloud");
        let cached = cache.load().await.unwrap().unwrap();
        assert_eq!(cached.trips[0].details.destination, "Cloud");
    }

    #[tokio::test]
    async fn local_document_is_uploaded() {
        let cache = LocalCache::in_dir(&temp_data_dir());
        cache.save(&document("Local")).await.unwrap();
        let store = Arc::new(MemoryDocumentStore::new());

        let manager = DataManager::open(cache, Some(store.clone()), "local").await;

        assert_eq!(manager.trips().await.len(), 1);
        assert_eq!(store.load("local").await.unwrap().unwrap().trips[0].details.destination, "Local");
    }

    #[tokio::test]
    async fn offline_store_falls_back_to_cache() {
        let cache = LocalCache::in_dir(&temp_data_dir());
        cache.save(&document("Local")).await.unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_offline(true);

        let manager = DataManager::open(cache.clone(), Some(store.clone()), "local").await;
        let trip = manager.create_trip().await;

        // The local copy is written even though the store rejects it
        manager.save_now().await.unwrap();
        assert_eq!(store.saves(), 0);
        assert_eq!(cache.load().await.unwrap().unwrap().trips[0].id, trip.id);
        assert!(manager.last_saved_at().is_some());
    }

    #[tokio::test]
    async fn autosave_waits_for_quiet() {
        let cache = LocalCache::in_dir(&temp_data_dir());
        let store = Arc::new(MemoryDocumentStore::new());
        let manager = DataManager::open(cache.clone(), Some(store.clone()), "local").await;
        manager.start_autosave(Duration::from_millis(100)).unwrap();
        assert!(manager.start_autosave(Duration::from_millis(100)).is_none());

        let trip = manager.create_trip().await;
        for note in ["a", "b", "c"] {
            tokio::time::sleep(Duration::from_millis(20)).await;
            manager.set_notes(&trip.id, note).await.unwrap();
        }
        assert_eq!(store.saves(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.saves(), 1);
        let cached = cache.load().await.unwrap().unwrap();
        assert_eq!(cached.trips[0].details.notes, "c");
    }

    #[tokio::test]
    async fn overlapping_saves_keep_latest_document() {
        let cache = LocalCache::in_dir(&temp_data_dir());
        let store = Arc::new(MemoryDocumentStore::new());
        let manager = DataManager::open(cache.clone(), Some(store.clone()), "local").await;
        let trip = manager.create_trip().await;
        manager.set_notes(&trip.id, "final").await.unwrap();

        let (a, b) = tokio::join!(manager.save_now(), manager.save_now());
        a.unwrap();
        b.unwrap();

        assert_eq!(store.saves(), 2);
        assert_eq!(cache.load().await.unwrap().unwrap().trips[0].details.notes, "final");
    }

    #[tokio::test]
    async fn route_sink_keeps_first_total() {
        let manager = DataManager::open(LocalCache::in_dir(&temp_data_dir()), None, "local").await;
        let trip = manager.create_trip().await;
        let sink = manager.route_sink(&trip.id);

        sink.report(report(500_000.)).await;
        sink.report(report(200_000.)).await;

        let details = manager.trip(&trip.id).await.unwrap().details;
        assert_eq!(details.total_distance_value, Some(500_000.));
        assert_eq!(details.remaining_distance_value, Some(200_000.));
        assert_eq!(details.distance.as_deref(), Some("200.0 km"));

        let progress = manager.progress(&trip.id, Utc::now()).await.unwrap();
        assert_eq!(progress.status, TripStatus::EnRouteGps);
        assert!((progress.percent - 60.).abs() < 1e-9);

        manager.clear_distance_baseline(&trip.id).await.unwrap();
        sink.report(report(150_000.)).await;
        let details = manager.trip(&trip.id).await.unwrap().details;
        assert_eq!(details.total_distance_value, Some(150_000.));
    }

    #[tokio::test]
    async fn trip_operations() {
        let manager = DataManager::open(LocalCache::in_dir(&temp_data_dir()), None, "local").await;
        let first = manager.create_trip().await;
        let second = manager.create_trip().await;
        assert_eq!(manager.active_trip().await.unwrap().id, second.id);

        manager.select_trip(&first.id).await.unwrap();
        manager.set_route_text(&first.id, "Natal", "Pipa").await.unwrap();
        let item = manager.add_checklist_item(&first.id, "Sunscreen", "Hygiene").await.unwrap().unwrap();
        assert!(manager.toggle_checklist_item(&first.id, &item.id).await.unwrap());
        let added = manager
            .add_checklist_suggestions(
                &first.id,
                &[
                    ChecklistSuggestion {
                        text: "sunscreen".into(),
                        category: "Hygiene".into(),
                    },
                    ChecklistSuggestion {
                        text: "Charger".into(),
                        category: "Electronics".into(),
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert!(manager.add_expense(&first.id, "Fuel", 250., ExpenseCategory::Fuel).await.unwrap().is_some());
        assert!(manager.add_expense(&first.id, "Toll", -3., ExpenseCategory::Toll).await.unwrap().is_none());
        let marker = manager.add_marker(&first.id, Coordinate::new(-6.2, -35.1), "").await.unwrap();
        assert_eq!(marker.label, "My location");

        let trip = manager.trip(&first.id).await.unwrap();
        assert_eq!(trip.details.destination, "Pipa");
        assert_eq!(trip.checklist_completion(), (1, 2));
        assert_eq!(trip.expense_total(), 250.);

        manager.delete_trip(&first.id).await.unwrap();
        assert!(manager.active_trip().await.is_none());
        assert!(matches!(manager.trip(&first.id).await, Err(DataManagerError::NotFound(_))));
        assert!(matches!(manager.set_notes(&first.id, "x").await, Err(DataManagerError::NotFound(_))));
    }

    #[tokio::test]
    async fn reset_all_saves_immediately() {
        let cache = LocalCache::in_dir(&temp_data_dir());
        let store = Arc::new(MemoryDocumentStore::new());
        store.save("local", &document("Cloud")).await.unwrap();
        let manager = DataManager::open(cache.clone(), Some(store.clone()), "local").await;

        manager.reset_all().await.unwrap();

        assert_eq!(cache.load().await.unwrap(), Some(AppData::default()));
        assert_eq!(store.load("local").await.unwrap(), Some(AppData::default()));
    }
}
