use crate::estimator::geo::{self, GeoPoint};
use crate::gtfs::{ShapePoint, TimedStop};

/// Where along the shape the selected trip should be right now.
#[derive(Debug, Clone)]
pub struct PositionEstimate {
    pub prev_stop_seq: u32,
    pub next_stop_seq: u32,
    pub progress_pct: u8,
    pub position: GeoPoint,
    pub bearing: f64,
}

struct SnappedStop {
    sequence: u32,
    departure_secs: u32,
    dist_along: f64,
}

/// Interpolate the trip's position at `now_secs`: snap each timed stop onto
/// the shape, bracket now between two consecutive departures, and convert
/// fractional time progress into an along-path distance.
///
/// Returns None when the shape or the timed stop list is too thin to place
/// a vehicle; the caller downgrades to a metadata-only response. Partial
/// shapes are expected in some feeds, so this is a recognized outcome, not
/// an error.
pub fn estimate_position(
    shape: &[ShapePoint],
    stops: &[TimedStop],
    now_secs: u32,
) -> Option<PositionEstimate> {
    if shape.len() < 2 || stops.len() < 2 {
        return None;
    }

    let polyline: Vec<GeoPoint> = shape
        .iter()
        .map(|p| GeoPoint { lng: p.lon, lat: p.lat })
        .collect();
    let cum = geo::cumulative_distances(&polyline);
    let total = match cum[cum.len() - 1] {
        len if len > 0.0 => len,
        _ => 1.0, // degenerate zero-length shape
    };

    let mut snapped: Vec<SnappedStop> = stops
        .iter()
        .map(|s| SnappedStop {
            sequence: s.sequence,
            departure_secs: s.departure_secs,
            dist_along: geo::nearest_vertex_distance(
                &polyline,
                &cum,
                GeoPoint { lng: s.lon, lat: s.lat },
            ),
        })
        .collect();
    snapped.sort_by_key(|s| s.sequence);

    // First stop still ahead of now; before the first departure we ride the
    // first segment, after the last we sit at the end of the final one.
    let idx = match snapped.iter().position(|s| s.departure_secs >= now_secs) {
        Some(0) => 1,
        Some(i) => i,
        None => snapped.len() - 1,
    };
    let a = &snapped[idx - 1];
    let b = &snapped[idx];

    let window = b.departure_secs.saturating_sub(a.departure_secs).max(1) as f64;
    let elapsed = now_secs as f64 - a.departure_secs as f64;
    let t = (elapsed / window).clamp(0.0, 1.0);
    let target = a.dist_along + t * (b.dist_along - a.dist_along);

    let (position, bearing) = geo::interpolate_along(&polyline, &cum, target);
    let progress_pct = (100.0 * target / total).round().clamp(0.0, 100.0) as u8;

    Some(PositionEstimate {
        prev_stop_seq: a.sequence,
        next_stop_seq: b.sequence,
        progress_pct,
        position,
        bearing,
    })
}
