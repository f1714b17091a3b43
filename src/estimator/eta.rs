use serde::Serialize;

use crate::estimator::geo::{self, GeoPoint};
use crate::gtfs::{OrderedStop, TimedStop};

/// A stop on the selected trip annotated with its countdown relative to
/// now.
#[derive(Debug, Clone, Serialize)]
pub struct StopEta {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_sequence: u32,
    pub departure_secs: u32,
    pub eta_seconds: i64,
    pub eta_label: String,
    pub is_nearest: bool,
}

/// The stop nearest the rider, with a true great-circle distance.
#[derive(Debug, Clone, Serialize)]
pub struct NearestStop {
    pub stop_id: String,
    pub stop_name: String,
    pub distance_m: f64,
}

/// Countdown label shown next to a stop. A bus more than a minute gone is
/// "Departed"; within the last minute it is "Due".
pub fn eta_label(eta_seconds: i64) -> String {
    if eta_seconds <= -60 {
        "Departed".to_string()
    } else if eta_seconds < 0 {
        "Due".to_string()
    } else {
        format!("{} min", (eta_seconds as f64 / 60.0).round() as i64)
    }
}

/// Pick the stop minimizing squared planar distance to the rider. The
/// reported distance is the honest haversine value in meters.
pub fn nearest_stop(stops: &[OrderedStop], rider: GeoPoint) -> Option<NearestStop> {
    let mut best: Option<(&OrderedStop, f64)> = None;
    for stop in stops {
        let dx = stop.lon - rider.lng;
        let dy = stop.lat - rider.lat;
        let d = dx * dx + dy * dy;
        if best.map_or(true, |(_, b)| d < b) {
            best = Some((stop, d));
        }
    }

    best.map(|(stop, _)| NearestStop {
        stop_id: stop.stop_id.clone(),
        stop_name: stop.name.clone(),
        distance_m: geo::haversine_distance(GeoPoint { lng: stop.lon, lat: stop.lat }, rider),
    })
}

/// Annotate every timed stop of the selected trip with its countdown and
/// flag the one matching the rider's nearest stop.
pub fn annotate_etas(
    stops: &[TimedStop],
    now_secs: u32,
    nearest_stop_id: Option<&str>,
) -> Vec<StopEta> {
    stops
        .iter()
        .map(|s| {
            let eta_seconds = s.departure_secs as i64 - now_secs as i64;
            StopEta {
                stop_id: s.stop_id.clone(),
                stop_name: s.name.clone(),
                stop_sequence: s.sequence,
                departure_secs: s.departure_secs,
                eta_seconds,
                eta_label: eta_label(eta_seconds),
                is_nearest: nearest_stop_id == Some(s.stop_id.as_str()),
            }
        })
        .collect()
}
