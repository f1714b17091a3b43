mod api;
mod estimator;
mod gtfs;
mod store;

use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use crate::api::AppState;
use crate::estimator::geo::GeoPoint;
use crate::store::MemoryStore;

#[derive(Parser)]
#[command(name = "boulder-bus-tracker")]
#[command(about = "Schedule-based bus position estimation for Better Boulder Buses")]
struct Args {
    /// Port to run the HTTP server on
    #[arg(short, long, env = "SERVER_PORT", default_value = "3000")]
    port: u16,

    /// GTFS feed archive: a local path or an HTTP(S) URL
    #[arg(long, env = "GTFS_FEED", default_value = "google_transit.zip")]
    feed: String,

    /// Agency time zone for service-day arithmetic
    #[arg(long, env = "AGENCY_TIMEZONE", default_value = "America/Denver")]
    timezone: String,

    /// Rider latitude assumed when a request carries no usable location
    #[arg(long, env = "FALLBACK_LAT", default_value_t = 40.0150)]
    fallback_lat: f64,

    /// Rider longitude assumed when a request carries no usable location
    #[arg(long, env = "FALLBACK_LON", default_value_t = -105.2705)]
    fallback_lon: f64,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let timezone = match chrono_tz::Tz::from_str(&args.timezone) {
        Ok(tz) => tz,
        Err(err) => {
            error!("invalid agency time zone {}: {}", args.timezone, err);
            return;
        }
    };

    let tables = match gtfs::loader::load_schedule(&args.feed).await {
        Ok(tables) => tables,
        Err(err) => {
            error!("failed to load GTFS feed: {}", err);
            return;
        }
    };

    let store = Arc::new(MemoryStore::build(tables));
    info!(
        "loaded {} routes, {} trips, {} stops",
        store.route_count(),
        store.trip_count(),
        store.stop_count()
    );

    let state = AppState {
        store,
        timezone,
        fallback_rider: GeoPoint {
            lng: args.fallback_lon,
            lat: args.fallback_lat,
        },
    };

    api::server::run_server(state, args.port).await;
}
