use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use road_trip_lib::RouteReport;
use tokio::{
    sync::{mpsc, oneshot},
    task::{JoinError, JoinHandle, JoinSet},
};
use tracing::{error, info};

use crate::{
    error::NavigationError,
    geocoder::Geocoder,
    position::{PositionEvent, PositionSource},
    router::Router,
    view::{RouteCompletion, RouteJob, RouteView, RouteViewSnapshot},
};

/// Receives every route the view displays, static or live.
#[async_trait]
pub trait RouteReportSink: Send + Sync {
    async fn report(&self, report: RouteReport);
}

enum Command {
    SetRouteText {
        origin: String,
        destination: String,
    },
    Refresh,
    StartTracking {
        reply: oneshot::Sender<Result<(), NavigationError>>,
    },
    StopTracking {
        reply: oneshot::Sender<Result<(), NavigationError>>,
    },
    Snapshot {
        reply: oneshot::Sender<RouteViewSnapshot>,
    },
    Shutdown,
}

enum Wake {
    Command(Command),
    Position(PositionEvent),
    Completed(Result<RouteCompletion, JoinError>),
    Closed,
}

/// Cheap to clone. The view shuts down once every handle is dropped.
#[derive(Clone)]
pub struct RouteViewHandle {
    commands: mpsc::Sender<Command>,
}

impl RouteViewHandle {
    async fn send(&self, command: Command) -> Result<(), NavigationError> {
        self.commands.send(command).await.map_err(|_| NavigationError::ViewClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, NavigationError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response.await.map_err(|_| NavigationError::ViewClosed)
    }

    pub async fn set_route_text(&self, origin: &str, destination: &str) -> Result<(), NavigationError> {
        self.send(Command::SetRouteText {
            origin: origin.to_string(),
            destination: destination.to_string(),
        })
        .await
    }

    pub async fn refresh(&self) -> Result<(), NavigationError> {
        self.send(Command::Refresh).await
    }

    pub async fn start_tracking(&self) -> Result<(), NavigationError> {
        self.request(|reply| Command::StartTracking { reply }).await?
    }

    pub async fn stop_tracking(&self) -> Result<(), NavigationError> {
        self.request(|reply| Command::StopTracking { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<RouteViewSnapshot, NavigationError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), NavigationError> {
        self.send(Command::Shutdown).await
    }
}

struct RouteViewTask {
    view: RouteView,
    geocoder: Geocoder,
    router: Router,
    source: Arc<dyn PositionSource>,
    sink: Arc<dyn RouteReportSink>,
    jobs: JoinSet<RouteCompletion>,
}

/// Runs a route view on its own task.
pub fn spawn_route_view(
    geocoder: Geocoder,
    router: Router,
    source: Arc<dyn PositionSource>,
    sink: Arc<dyn RouteReportSink>,
) -> (RouteViewHandle, JoinHandle<()>) {
    let (commands, receiver) = mpsc::channel(32);
    let task = RouteViewTask {
        view: RouteView::new(),
        geocoder,
        router,
        source,
        sink,
        jobs: JoinSet::new(),
    };

    let handle = tokio::spawn(task.run(receiver));
    (RouteViewHandle { commands }, handle)
}

impl RouteViewTask {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let wake = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Closed,
                },
                event = self.view.next_position_event() => Wake::Position(event),
                Some(completed) = self.jobs.join_next() => Wake::Completed(completed),
            };

            match wake {
                Wake::Command(Command::Shutdown) | Wake::Closed => break,
                Wake::Command(command) => self.handle_command(command),
                Wake::Position(event) => {
                    let job = self.view.handle_position(event, Utc::now());
                    self.spawn(job);
                }
                Wake::Completed(Ok(completion)) => {
                    if let Some(report) = self.view.apply(completion) {
                        self.sink.report(report).await;
                    }
                }
                Wake::Completed(Err(err)) => error!("Route request task failed: {}", err),
            }
        }

        self.view.teardown();
        self.jobs.abort_all();
        info!("Route view stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetRouteText { origin, destination } => {
                let job = self.view.set_route_text(&origin, &destination);
                self.spawn(job);
            }
            Command::Refresh => {
                let job = self.view.refresh();
                self.spawn(job);
            }
            Command::StartTracking { reply } => {
                let _ = reply.send(self.view.start_tracking(self.source.as_ref()));
            }
            Command::StopTracking { reply } => {
                let result = self.view.stop_tracking().map(|job| self.spawn(job));
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.view.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn spawn(&mut self, job: Option<RouteJob>) {
        let Some(job) = job else {
            return;
        };

        let geocoder = self.geocoder.clone();
        let router = self.router.clone();
        self.jobs.spawn(async move { job.run(&geocoder, &router).await });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use road_trip_lib::{Coordinate, RouteMode};

    use super::*;
    use crate::{
        display::DisplayPhase,
        fake::{FakeGeocoding, FakePositionSource, FakeRouting, RecordingSink},
    };

    async fn wait_for(handle: &RouteViewHandle, done: impl Fn(&RouteViewSnapshot) -> bool) -> RouteViewSnapshot {
        for _ in 0..200 {
            let snapshot = handle.snapshot().await.unwrap();
            if done(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("route view never reached the expected state");
    }

    #[tokio::test]
    async fn reports_static_route() {
        let geocoding = Arc::new(
            FakeGeocoding::new()
                .with_place("Porto Alegre", Coordinate::new(-30.03, -51.23))
                .with_place("Florianopolis", Coordinate::new(-27.59, -48.55)),
        );
        let sink = Arc::new(RecordingSink::default());
        let (handle, task) = spawn_route_view(
            Geocoder::new(geocoding),
            Router::new(Arc::new(FakeRouting::new(476_000., 21_600.))),
            Arc::new(FakePositionSource::new()),
            sink.clone(),
        );

        handle.set_route_text("Porto Alegre", "Florianopolis").await.unwrap();
        let snapshot = wait_for(&handle, |s| s.phase == DisplayPhase::Ready).await;
        assert_eq!(snapshot.route.unwrap().summary.duration_label, "6h 0min");

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].mode, RouteMode::Static);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.snapshot().await, Err(NavigationError::ViewClosed)));
    }

    #[tokio::test]
    async fn shutdown_cancels_position_watch() {
        let source = Arc::new(FakePositionSource::new());
        let (handle, task) = spawn_route_view(
            Geocoder::new(Arc::new(FakeGeocoding::new())),
            Router::new(Arc::new(FakeRouting::new(1000., 60.))),
            source.clone(),
            Arc::new(RecordingSink::default()),
        );

        handle.start_tracking().await.unwrap();
        assert!(!source.is_cancelled());
        assert_eq!(handle.start_tracking().await, Err(NavigationError::AlreadyTracking));

        drop(handle);
        task.await.unwrap();
        assert!(source.is_cancelled());
    }
}
