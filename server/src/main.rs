use std::{fs::OpenOptions, net::SocketAddr, sync::Arc};

use anyhow::Context;
use road_trip_data_management::{DataManager, assistant::Assistant, config::AppConfig};
use road_trip_routing::{
    Geocoder, Router,
    nominatim::{NominatimClient, NominatimClientParams},
    osrm::{OsrmRouteClient, OsrmRouteClientParams},
};
use server::{routes, server_state::ServerState, tracker_endpoint};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::fs::create_dir_all("server/log")?;
    let log_file = "server/log/server.log";

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=debug,road_trip_routing=debug,road_trip_data_management=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    tracing::info!("Starting server...");

    let config = AppConfig::from_env()?;
    let data_manager = DataManager::start(&config).await?;

    let geocoder = Geocoder::new(Arc::new(NominatimClient::new(NominatimClientParams {
        base_url: config.nominatim_url.clone(),
        user_agent: config.user_agent.clone(),
    })?));
    let router = Router::new(Arc::new(OsrmRouteClient::new(OsrmRouteClientParams {
        base_url: config.osrm_url.clone(),
    })));
    let assistant = Assistant::from_url(config.assistant_url.as_deref());
    if !assistant.is_enabled() {
        tracing::info!("No assistant configured, tips and checklist suggestions use fallbacks");
    }

    let server_state = Arc::new(ServerState::new(data_manager.clone(), geocoder, router, assistant));

    let state_clone = server_state.clone();
    let tracker_port = config.tracker_port;
    tokio::spawn(async move {
        if let Err(err) = tracker_endpoint::listen(state_clone, tracker_port).await {
            tracing::error!("Tracker endpoint stopped: {:?}", err);
        }
    });

    let app = routes::app(server_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    data_manager.save_now().await?;
    tracing::info!("Server stopped");
    Ok(())
}
