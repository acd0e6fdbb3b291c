use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use road_trip_data_management::{DataManager, assistant::Assistant, config::AppConfig};
use road_trip_lib::{
    format::{format_distance, format_duration},
    progress,
    trip::{ExpenseCategory, Trip},
};
use road_trip_routing::{
    Geocoder, RouteView, Router, external_directions_url,
    nominatim::{NominatimClient, NominatimClientParams},
    osrm::{OsrmRouteClient, OsrmRouteClientParams},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "RoadTripCLI")]
#[command(about = "A CLI to plan road trips and inspect their routes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all trips
    Trips,
    /// Create a trip and make it active
    New,
    /// Delete a trip
    Delete { trip_id: String },
    /// Make a trip the active one
    Select { trip_id: String },
    /// Set origin and destination of a trip
    SetRoute {
        trip_id: String,
        origin: String,
        destination: String,
    },
    /// Set the departure time, RFC 3339
    SetStart { trip_id: String, start: DateTime<Utc> },
    /// Resolve an address to coordinates
    Geocode { address: String },
    /// Address suggestions for partial input
    Suggest { partial: String },
    /// Compute the driving route of a trip and store its figures
    Route { trip_id: String },
    /// Show trip progress and countdown
    Progress { trip_id: String },
    /// Forget the total distance so the next route sets a new one
    ClearBaseline { trip_id: String },
    /// Add a checklist item
    AddItem {
        trip_id: String,
        text: String,
        #[arg(default_value = "General")]
        category: String,
    },
    /// Ask the assistant for checklist items and add the new ones
    SuggestItems {
        trip_id: String,
        #[arg(default_value_t = 3)]
        days: u32,
    },
    /// Record an expense. Categories: fuel, food, lodging, toll, other
    AddExpense {
        trip_id: String,
        description: String,
        amount: f64,
        category: ExpenseCategory,
    },
    /// Show expense totals per category
    Expenses { trip_id: String },
    /// Travel tips for the trip destination
    Tips { trip_id: String },
    /// Delete every trip. BE CAREFUL
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info,road_trip_routing=info,road_trip_data_management=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let data_manager = DataManager::start(&config).await?;

    match &cli.command {
        Commands::Trips => {
            let active = data_manager.active_trip().await.map(|trip| trip.id);
            for trip in data_manager.trips().await {
                let marker = if active.as_deref() == Some(trip.id.as_str()) { "*" } else { "." };
                println!("{}\t{}\t{}", trip.id, marker, describe(&trip));
            }
        }
        Commands::New => {
            let trip = data_manager.create_trip().await;
            println!("{}", trip.id);
        }
        Commands::Delete { trip_id } => data_manager.delete_trip(trip_id).await?,
        Commands::Select { trip_id } => data_manager.select_trip(trip_id).await?,
        Commands::SetRoute { trip_id, origin, destination } => {
            data_manager.set_route_text(trip_id, origin, destination).await?;
        }
        Commands::SetStart { trip_id, start } => data_manager.set_start_date(trip_id, Some(*start)).await?,
        Commands::Geocode { address } => {
            let coordinate = geocoder(&config)?.resolve(address).await?;
            println!("{}, {}", coordinate.lat, coordinate.lng);
        }
        Commands::Suggest { partial } => {
            for name in geocoder(&config)?.suggest(partial).await {
                println!("{}", name);
            }
        }
        Commands::Route { trip_id } => {
            let trip = data_manager.trip(trip_id).await?;
            let mut view = RouteView::new();
            let job = view
                .set_route_text(&trip.details.origin, &trip.details.destination)
                .ok_or_else(|| anyhow!("Trip {} has no origin or destination", trip_id))?;

            let completion = job.run(&geocoder(&config)?, &router(&config)).await;
            let Some(report) = view.apply(completion) else {
                let snapshot = view.snapshot();
                return Err(anyhow!(snapshot.last_error.unwrap_or_else(|| "No route found".to_string())));
            };

            data_manager.apply_route_report(trip_id, &report).await?;
            println!("{} / {}", report.distance_label, report.duration_label);
            if let Some(route) = view.snapshot().route {
                for step in route.steps.iter().filter(|step| !step.road_name.is_empty()) {
                    println!("  {}\t{}", format_distance(step.distance_meters), step.road_name);
                }
            }
            if let Some(url) = external_directions_url(&trip.details.origin, &trip.details.destination, None) {
                println!("{}", url);
            }
        }
        Commands::Progress { trip_id } => {
            let now = Utc::now();
            let trip = data_manager.trip(trip_id).await?;
            let progress = progress::project(&trip.details, now);
            println!("{:?}\t{:.0}%", progress.status, progress.percent);
            if let Some(start) = trip.details.start_date {
                let left = progress::countdown(start, now);
                println!("{}d {}h {}min {}s", left.days, left.hours, left.minutes, left.seconds);
            }
        }
        Commands::ClearBaseline { trip_id } => data_manager.clear_distance_baseline(trip_id).await?,
        Commands::AddItem { trip_id, text, category } => {
            data_manager
                .add_checklist_item(trip_id, text, category)
                .await?
                .context("Checklist items need text")?;
        }
        Commands::SuggestItems { trip_id, days } => {
            let trip = data_manager.trip(trip_id).await?;
            let assistant = Assistant::from_url(config.assistant_url.as_deref());
            let suggestions = assistant.smart_checklist(&trip.details.destination, *days).await;
            let added = data_manager.add_checklist_suggestions(trip_id, &suggestions).await?;
            println!("Added {} of {} suggested items", added, suggestions.len());
        }
        Commands::AddExpense { trip_id, description, amount, category } => {
            data_manager
                .add_expense(trip_id, description, *amount, *category)
                .await?
                .context("Expenses need a description and a positive amount")?;
        }
        Commands::Expenses { trip_id } => {
            let trip = data_manager.trip(trip_id).await?;
            for (category, total) in trip.expense_totals_by_category() {
                println!("{:?}\t{:.2}", category, total);
            }
            println!("Total\t{:.2}", trip.expense_total());
        }
        Commands::Tips { trip_id } => {
            let trip = data_manager.trip(trip_id).await?;
            let assistant = Assistant::from_url(config.assistant_url.as_deref());
            println!("{}", assistant.travel_tips(&trip.details.destination).await);
        }
        Commands::Reset => data_manager.reset_all().await?,
    }

    data_manager.save_now().await?;
    Ok(())
}

fn geocoder(config: &AppConfig) -> anyhow::Result<Geocoder> {
    let client = NominatimClient::new(NominatimClientParams {
        base_url: config.nominatim_url.clone(),
        user_agent: config.user_agent.clone(),
    })?;
    Ok(Geocoder::new(Arc::new(client)))
}

fn router(config: &AppConfig) -> Router {
    Router::new(Arc::new(OsrmRouteClient::new(OsrmRouteClientParams {
        base_url: config.osrm_url.clone(),
    })))
}

fn describe(trip: &Trip) -> String {
    let details = &trip.details;
    let route = match (details.origin.trim(), details.destination.trim()) {
        ("", "") => "(no route)".to_string(),
        (origin, destination) => format!("{} -> {}", origin, destination),
    };
    let figures = match (details.total_distance_value, details.duration_value) {
        (Some(distance), Some(duration)) => format!("{} / {}", format_distance(distance), format_duration(duration)),
        _ => "-".to_string(),
    };
    format!("{}\t{}", route, figures)
}
