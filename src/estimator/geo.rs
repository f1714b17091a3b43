const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

/// Great-circle distance in meters between two points.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1_rad = a.lat.to_radians();
    let lat2_rad = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Indicative heading from one point toward another, in degrees. This is
/// the planar atan2(delta lng, delta lat) form, not a geodetic initial
/// bearing; consumers only rotate a marker icon with it.
pub fn planar_bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    (to.lng - from.lng).atan2(to.lat - from.lat).to_degrees()
}

/// Running distance along a polyline: `cum[0] = 0`, each later entry adds
/// the haversine length of the preceding segment.
pub fn cumulative_distances(points: &[GeoPoint]) -> Vec<f64> {
    let mut cum = vec![0.0; points.len()];
    for i in 1..points.len() {
        cum[i] = cum[i - 1] + haversine_distance(points[i - 1], points[i]);
    }
    cum
}

/// Along-polyline distance of the vertex nearest to `target`, by squared
/// planar degree distance. Stops sit close enough to a shape vertex that
/// the vertex snap stands in for a true segment projection.
pub fn nearest_vertex_distance(points: &[GeoPoint], cum: &[f64], target: GeoPoint) -> f64 {
    let mut best_idx = 0;
    let mut best = f64::INFINITY;
    for (i, p) in points.iter().enumerate() {
        let dx = p.lng - target.lng;
        let dy = p.lat - target.lat;
        let d = dx * dx + dy * dy;
        if d < best {
            best = d;
            best_idx = i;
        }
    }
    cum[best_idx]
}

/// Point and heading at `target_dist` meters along the polyline. Distances
/// past the final vertex clamp onto the last segment. Requires at least
/// two points.
pub fn interpolate_along(points: &[GeoPoint], cum: &[f64], target_dist: f64) -> (GeoPoint, f64) {
    debug_assert!(points.len() >= 2 && points.len() == cum.len());

    let mut seg = 1;
    while seg < cum.len() && cum[seg] < target_dist {
        seg += 1;
    }
    if seg >= cum.len() {
        seg = cum.len() - 1;
    }

    let prev = seg - 1;
    let seg_len = cum[seg] - cum[prev];
    let t = if seg_len > 0.0 {
        ((target_dist - cum[prev]) / seg_len).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let p = points[prev];
    let q = points[seg];
    let position = GeoPoint {
        lng: p.lng + (q.lng - p.lng) * t,
        lat: p.lat + (q.lat - p.lat) * t,
    };

    (position, planar_bearing(p, q))
}
