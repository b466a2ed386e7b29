use std::error::Error;
use std::sync::Arc;

use tracing::{info, warn};

use trip_planner::api::HttpTripApi;
use trip_planner::config::AppConfig;
use trip_planner::directions::DirectionsClient;
use trip_planner::domain::{Coordinates, UserId};
use trip_planner::geocode::{
    AddressLookup, CachedGeocoder, DEFAULT_LOOKUP_TIMEOUT, GeocodeCacheConfig, GoogleGeocoder,
};
use trip_planner::store::{StoreConfig, TripStateStore};
use trip_planner::viewport::{ViewportCalculator, ViewportConfig};

/// Usage: `trip-planner <user-id> [lat,lng]`
///
/// Loads the user's active trip, prints its viewport, resolves the current
/// location to an address and optimizes the stop order.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;

    let mut args = std::env::args().skip(1);
    let user_id = match args.next().or_else(|| std::env::var("TRIP_USER_ID").ok()) {
        Some(raw) => UserId::new(raw)?,
        None => return Err("usage: trip-planner <user-id> [lat,lng]".into()),
    };
    let here = args.next().as_deref().map(parse_coordinates).transpose()?;

    let api = HttpTripApi::new(config.trip_api())?;
    let store = TripStateStore::new(api, StoreConfig::default());
    let directions = DirectionsClient::new(config.directions())?;
    let geocoder = Arc::new(CachedGeocoder::new(
        GoogleGeocoder::new(config.geocoder())?,
        &GeocodeCacheConfig::default(),
    ));

    // Started early so it overlaps the Trip API round trip.
    let lookup = here.map(|coords| AddressLookup::spawn(geocoder.clone(), coords, DEFAULT_LOOKUP_TIMEOUT));

    let active = store.fetch_active_trip(&user_id).await?;
    let viewport = ViewportCalculator::new(ViewportConfig::default());
    let region = viewport.region_for_trip(active.as_ref(), here);
    info!(
        latitude = region.latitude,
        longitude = region.longitude,
        latitude_delta = region.latitude_delta,
        longitude_delta = region.longitude_delta,
        "Viewport"
    );

    if let Some(lookup) = lookup {
        match lookup.finish().await {
            Some(address) => info!(address = %address, "Current location"),
            None => warn!("Could not resolve current location"),
        }
    }

    let Some(trip) = active else {
        info!(user_id = %user_id, "No active trip");
        return Ok(());
    };
    info!(trip_id = %trip.trip_id, name = %trip.name, stops = trip.stops.len(), "Active trip");

    match store.optimize_active_trip(&directions).await? {
        Some(route) => {
            let trip = store.active_trip().unwrap_or(trip);
            for (position, stop) in trip.stops.iter().enumerate() {
                println!("{:>2}. {}", position + 1, stop.address());
            }
            println!(
                "{:.1} km, {:.0} min",
                route.total_distance_km(),
                route.total_duration_min()
            );
        }
        None => println!("No route available for {}", trip.name),
    }

    Ok(())
}

fn parse_coordinates(raw: &str) -> Result<Coordinates, Box<dyn Error + Send + Sync>> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lng, got {raw:?}"))?;
    let coords = Coordinates::new(lat.trim().parse()?, lng.trim().parse()?);
    if !coords.is_valid() {
        return Err(format!("coordinates out of range: {raw}").into());
    }
    Ok(coords)
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,trip_planner=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
