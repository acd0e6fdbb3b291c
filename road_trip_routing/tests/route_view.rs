use std::{sync::Arc, time::Duration};

use chrono::Utc;
use road_trip_lib::{Coordinate, RouteMode};
use road_trip_routing::{
    Geocoder, NavigationError, PositionEvent, PositionFix, Router, RouteViewHandle, RouteViewSnapshot,
    display::DisplayPhase,
    fake::{FakeGeocoding, FakePositionSource, FakeRouting, RecordingSink},
    spawn_route_view,
};

const CAMPINAS: Coordinate = Coordinate { lat: -22.9, lng: -47.06 };
const SANTOS: Coordinate = Coordinate { lat: -23.96, lng: -46.33 };

struct Harness {
    handle: RouteViewHandle,
    routing: Arc<FakeRouting>,
    source: Arc<FakePositionSource>,
    sink: Arc<RecordingSink>,
}

fn harness(routing: FakeRouting, source: FakePositionSource) -> Harness {
    let geocoding = Arc::new(
        FakeGeocoding::new()
            .with_place("Campinas", CAMPINAS)
            .with_place("Santos", SANTOS),
    );
    let routing = Arc::new(routing);
    let source = Arc::new(source);
    let sink = Arc::new(RecordingSink::default());

    let (handle, _task) = spawn_route_view(
        Geocoder::new(geocoding),
        Router::new(routing.clone()),
        source.clone(),
        sink.clone(),
    );

    Harness {
        handle,
        routing,
        source,
        sink,
    }
}

async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}

async fn wait_for(handle: &RouteViewHandle, done: impl Fn(&RouteViewSnapshot) -> bool) -> RouteViewSnapshot {
    for _ in 0..400 {
        let snapshot = handle.snapshot().await.unwrap();
        if done(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("route view never reached the expected state");
}

fn fix(coordinate: Coordinate) -> PositionEvent {
    PositionEvent::Fix(PositionFix::new(coordinate, 8., Utc::now()))
}

#[tokio::test]
async fn late_live_route_is_ignored_after_stop() {
    let h = harness(FakeRouting::gated(90_000., 4_500.), FakePositionSource::new());

    h.handle.set_route_text("Campinas", "Santos").await.unwrap();
    h.routing.release(1);
    wait_for(&h.handle, |s| s.phase == DisplayPhase::Ready).await;

    h.handle.start_tracking().await.unwrap();
    assert!(h.source.publish(fix(Coordinate::new(-23.2, -46.9))).await);
    eventually(|| h.routing.calls() == 2).await;

    // The live request is still held when tracking stops
    h.handle.stop_tracking().await.unwrap();
    eventually(|| h.routing.calls() == 3).await;
    h.routing.release(2);

    eventually(|| h.sink.reports().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(!snapshot.tracking);
    let route = snapshot.route.unwrap();
    assert_eq!(route.mode, RouteMode::Static);
    assert_eq!(route.geometry.points()[0], CAMPINAS);
    assert!(h.sink.reports().iter().all(|report| report.mode == RouteMode::Static));
}

#[tokio::test]
async fn rapid_fixes_fetch_one_route() {
    let h = harness(FakeRouting::new(90_000., 4_500.), FakePositionSource::new());

    h.handle.set_route_text("", "Santos").await.unwrap();
    wait_for(&h.handle, |s| s.phase == DisplayPhase::Failed).await;
    assert_eq!(h.routing.calls(), 0);

    h.handle.start_tracking().await.unwrap();
    for lng in [-46.90, -46.89, -46.88] {
        assert!(h.source.publish(fix(Coordinate::new(-23.2, lng))).await);
    }

    let snapshot = wait_for(&h.handle, |s| {
        s.route.as_ref().is_some_and(|r| r.mode == RouteMode::Live)
            && s.live_position.is_some_and(|p| p.coordinate.lng == -46.88)
    })
    .await;
    assert!(snapshot.tracking);
    assert_eq!(h.routing.calls(), 1);

    let reports = h.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].mode, RouteMode::Live);
    assert_eq!(reports[0].distance_meters, 90_000.);
}

#[tokio::test]
async fn device_error_stops_tracking() {
    let h = harness(FakeRouting::new(90_000., 4_500.), FakePositionSource::new());

    h.handle.set_route_text("Campinas", "Santos").await.unwrap();
    wait_for(&h.handle, |s| s.phase == DisplayPhase::Ready).await;

    h.handle.start_tracking().await.unwrap();
    assert!(h.source.publish(PositionEvent::Error("position unavailable".into())).await);

    let snapshot = wait_for(&h.handle, |s| !s.tracking).await;
    assert!(snapshot.last_error.unwrap().contains("position unavailable"));
    assert!(h.source.is_cancelled());

    // Static recompute after the fallback
    eventually(|| h.routing.calls() == 2).await;
    assert_eq!(h.handle.stop_tracking().await, Err(NavigationError::NotTracking));
}

#[tokio::test]
async fn ended_device_stops_tracking_quietly() {
    let h = harness(FakeRouting::new(90_000., 4_500.), FakePositionSource::new());

    h.handle.set_route_text("Campinas", "Santos").await.unwrap();
    wait_for(&h.handle, |s| s.phase == DisplayPhase::Ready).await;

    h.handle.start_tracking().await.unwrap();
    assert!(h.source.publish(PositionEvent::Ended).await);

    let snapshot = wait_for(&h.handle, |s| !s.tracking).await;
    assert_eq!(snapshot.last_error, None);
    assert!(h.source.is_cancelled());
    eventually(|| h.routing.calls() == 2).await;
}

#[tokio::test]
async fn unsupported_device_keeps_static_mode() {
    let h = harness(FakeRouting::new(90_000., 4_500.), FakePositionSource::unsupported());

    h.handle.set_route_text("Campinas", "Santos").await.unwrap();
    wait_for(&h.handle, |s| s.phase == DisplayPhase::Ready).await;

    assert_eq!(
        h.handle.start_tracking().await,
        Err(NavigationError::DeviceLocationUnsupported)
    );

    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(!snapshot.tracking);
    assert_eq!(snapshot.route.unwrap().mode, RouteMode::Static);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Device location is not supported")
    );
}

#[tokio::test]
async fn denied_permission_is_reported() {
    let h = harness(FakeRouting::new(90_000., 4_500.), FakePositionSource::denied());
    assert_eq!(h.handle.start_tracking().await, Err(NavigationError::DeviceLocationDenied));
}
