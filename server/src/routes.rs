use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::Utc;
use road_trip_data_management::DataManagerError;
use road_trip_lib::{
    progress::{self, Countdown, TripProgress},
    trip::{Trip, TripDetails},
};
use road_trip_routing::{NavigationError, RouteViewSnapshot, external_directions_url};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server_state::ServerState;

const DEFAULT_CHECKLIST_DAYS: u32 = 3;

pub fn app(server_state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trip/{trip_id}", get(get_trip).delete(delete_trip))
        .route("/trip/{trip_id}/route", put(set_route))
        .route("/trip/{trip_id}/view", get(get_view))
        .route("/trip/{trip_id}/tracking/start", post(start_tracking))
        .route("/trip/{trip_id}/tracking/stop", post(stop_tracking))
        .route("/trip/{trip_id}/progress", get(get_progress))
        .route("/trip/{trip_id}/baseline", delete(clear_baseline))
        .route("/trip/{trip_id}/tips", get(get_tips))
        .route("/trip/{trip_id}/checklist/suggest", post(suggest_checklist))
        .route("/suggest", get(suggest))
        .with_state(server_state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<DataManagerError> for ApiError {
    fn from(err: DataManagerError) -> Self {
        let status = match err {
            DataManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => {
                tracing::error!("Request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<NavigationError> for ApiError {
    fn from(err: NavigationError) -> Self {
        let status = match err {
            NavigationError::NotFound { .. } => StatusCode::NOT_FOUND,
            NavigationError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            NavigationError::ViewClosed => StatusCode::INTERNAL_SERVER_ERROR,
            NavigationError::DeviceLocationUnsupported
            | NavigationError::DeviceLocationDenied
            | NavigationError::DeviceLocationError(_)
            | NavigationError::AlreadyTracking
            | NavigationError::NotTracking => StatusCode::CONFLICT,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn list_trips(State(state): State<Arc<ServerState>>) -> Json<Vec<Trip>> {
    Json(state.data_manager.trips().await)
}

async fn create_trip(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<Trip>) {
    let trip = state.data_manager.create_trip().await;
    tracing::info!("Created trip {}", trip.id);
    (StatusCode::CREATED, Json(trip))
}

async fn get_trip(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<Json<Trip>> {
    Ok(Json(state.data_manager.trip(&trip_id).await?))
}

async fn delete_trip(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<StatusCode> {
    state.close_route_view(&trip_id).await;
    state.data_manager.delete_trip(&trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct RouteText {
    origin: String,
    destination: String,
}

async fn set_route(
    State(state): State<Arc<ServerState>>,
    Path(trip_id): Path<String>,
    Json(text): Json<RouteText>,
) -> ApiResult<Json<TripDetails>> {
    let details = state.data_manager.set_route_text(&trip_id, &text.origin, &text.destination).await?;
    let (view, started) = state.open_route_view(&trip_id).await?;
    if !started {
        view.set_route_text(&text.origin, &text.destination).await?;
    }
    Ok(Json(details))
}

#[derive(Debug, Serialize)]
struct ViewResponse {
    #[serde(flatten)]
    snapshot: RouteViewSnapshot,
    directions_url: Option<String>,
}

async fn get_view(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<Json<ViewResponse>> {
    let snapshot = state.route_view(&trip_id).await?.snapshot().await?;
    let live_position = snapshot.live_position.map(|fix| fix.coordinate);
    let directions_url =
        external_directions_url(&snapshot.origin, &snapshot.destination, live_position).map(|url| url.to_string());

    Ok(Json(ViewResponse {
        snapshot,
        directions_url,
    }))
}

async fn start_tracking(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<StatusCode> {
    state.route_view(&trip_id).await?.start_tracking().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_tracking(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<StatusCode> {
    state.route_view(&trip_id).await?.stop_tracking().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ProgressResponse {
    progress: TripProgress,
    countdown: Option<Countdown>,
}

async fn get_progress(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<Json<ProgressResponse>> {
    let now = Utc::now();
    let trip = state.data_manager.trip(&trip_id).await?;
    Ok(Json(ProgressResponse {
        progress: progress::project(&trip.details, now),
        countdown: trip.details.start_date.map(|start| progress::countdown(start, now)),
    }))
}

async fn clear_baseline(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<StatusCode> {
    state.data_manager.clear_distance_baseline(&trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_tips(State(state): State<Arc<ServerState>>, Path(trip_id): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    let trip = state.data_manager.trip(&trip_id).await?;
    let destination = trip.details.destination.trim();
    if destination.is_empty() {
        return Err(ApiError::bad_request("Trip has no destination"));
    }

    let tips = state.assistant.travel_tips(destination).await;
    Ok(Json(json!({ "tips": tips })))
}

#[derive(Debug, Deserialize)]
struct ChecklistQuery {
    days: Option<u32>,
}

async fn suggest_checklist(
    State(state): State<Arc<ServerState>>,
    Path(trip_id): Path<String>,
    Query(query): Query<ChecklistQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let trip = state.data_manager.trip(&trip_id).await?;
    let destination = trip.details.destination.trim();
    if destination.is_empty() {
        return Err(ApiError::bad_request("Trip has no destination"));
    }

    let days = query.days.unwrap_or(DEFAULT_CHECKLIST_DAYS);
    let suggestions = state.assistant.smart_checklist(destination, days).await;
    let added = state.data_manager.add_checklist_suggestions(&trip_id, &suggestions).await?;
    Ok(Json(json!({ "added": added })))
}

#[derive(Debug, Deserialize)]
struct SuggestQuery {
    q: String,
}

async fn suggest(State(state): State<Arc<ServerState>>, Query(query): Query<SuggestQuery>) -> Json<Vec<String>> {
    Json(state.geocoder.suggest(&query.q).await)
}
