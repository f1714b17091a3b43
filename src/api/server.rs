use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono_tz::Tz;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::estimator::eta::{NearestStop, StopEta};
use crate::estimator::geo::GeoPoint;
use crate::estimator::{self, Estimate, EstimateError, EstimateRequest};
use crate::store::{MemoryStore, ScheduleStore, StoreError};

const ESTIMATE_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub timezone: Tz,
    pub fallback_rider: GeoPoint,
}

pub async fn run_server(state: AppState, port: u16) {
    let app = Router::new()
        .route("/api/routes", get(list_routes))
        .route("/api/routes/{route_id}/directions", get(list_directions))
        .route("/api/routes/{route_id}/shape", get(route_shape))
        .route("/api/routes/{route_id}/stops", get(route_stops))
        .route("/api/routes/{route_id}/estimate", get(estimate))
        .route("/health", get(health_check))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[derive(Debug, Default, Deserialize)]
struct DirectionParams {
    direction_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EstimateParams {
    direction_id: Option<String>,
    at: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
}

async fn list_routes(State(state): State<AppState>) -> Response {
    match state.store.routes() {
        Ok(routes) => {
            let rows: Vec<_> = routes
                .iter()
                .map(|r| {
                    json!({
                        "route_id": r.route_id,
                        "route_short_name": r.short_name,
                        "route_long_name": r.long_name,
                    })
                })
                .collect();
            Json(rows).into_response()
        }
        Err(err) => store_error_response(err, "Failed to load routes"),
    }
}

async fn list_directions(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Response {
    match state.store.directions_for(&route_id) {
        Ok(directions) => Json(directions).into_response(),
        Err(err) => store_error_response(err, "Failed to load directions"),
    }
}

async fn route_shape(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
    Query(params): Query<DirectionParams>,
) -> Response {
    let direction_id = parse_direction(params.direction_id.as_deref());

    let representative = match state.store.representative(&route_id, direction_id) {
        Ok(rep) => rep,
        Err(err) => return store_error_response(err, "Failed to load shape"),
    };
    let Some(shape_id) = representative.and_then(|r| r.shape_id) else {
        return not_found("Shape not found for route/direction");
    };

    let points = match state.store.shape_points(&shape_id) {
        Ok(points) => points,
        Err(err) => return store_error_response(err, "Failed to load shape"),
    };
    if points.is_empty() {
        return not_found("Shape points missing for representative shape");
    }

    let coordinates: Vec<[f64; 2]> = points.iter().map(|p| [p.lon, p.lat]).collect();
    Json(json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "route_id": route_id, "direction_id": direction_id },
            "geometry": { "type": "LineString", "coordinates": coordinates },
        }],
    }))
    .into_response()
}

async fn route_stops(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
    Query(params): Query<DirectionParams>,
) -> Response {
    let direction_id = parse_direction(params.direction_id.as_deref());

    match state.store.ordered_stops(&route_id, direction_id) {
        Ok(stops) if stops.is_empty() => not_found("Stops not found for route/direction"),
        Ok(stops) => {
            let rows: Vec<_> = stops
                .iter()
                .map(|s| {
                    json!({
                        "stop_id": s.stop_id,
                        "stop_name": s.name,
                        "lon": s.lon,
                        "lat": s.lat,
                        "stop_sequence": s.sequence,
                    })
                })
                .collect();
            Json(rows).into_response()
        }
        Err(err) => store_error_response(err, "Failed to load stops"),
    }
}

async fn estimate(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
    Query(params): Query<EstimateParams>,
) -> Response {
    let request = EstimateRequest {
        route_id: route_id.clone(),
        direction_id: parse_direction(params.direction_id.as_deref()),
        at_epoch: parse_epoch(params.at.as_deref()),
        rider: parse_rider(params.lat.as_deref(), params.lon.as_deref()),
    };

    let outcome = tokio::time::timeout(Duration::from_secs(ESTIMATE_TIMEOUT_SECS), async {
        estimator::run_estimate(
            state.store.as_ref(),
            state.timezone,
            state.fallback_rider,
            &request,
        )
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            Json(estimate_body(route_id, request.direction_id, result)).into_response()
        }
        Ok(Err(err)) => estimate_error_response(err),
        Err(_) => estimate_error_response(EstimateError::Timeout),
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Debug, Serialize)]
struct PositionBody {
    lng: f64,
    lat: f64,
    bearing: f64,
}

#[derive(Debug, Serialize)]
struct EstimateBody {
    ok: bool,
    route_id: String,
    direction_id: u8,
    now_secs: u32,
    now_epoch: i64,
    now_local: String,
    service_count_today: usize,
    chosen_trip_id: Option<String>,
    trip_start_secs: Option<u32>,
    trip_end_secs: Option<u32>,
    trip_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev_stop_seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_stop_seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress_pct: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<PositionBody>,
    stops: Vec<StopEta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nearest_stop: Option<NearestStop>,
}

fn estimate_body(route_id: String, direction_id: u8, estimate: Estimate) -> EstimateBody {
    let Estimate {
        clock,
        service_count,
        selected,
        position,
        stops,
        nearest,
    } = estimate;

    EstimateBody {
        ok: true,
        route_id,
        direction_id,
        now_secs: clock.now_secs,
        now_epoch: clock.epoch_secs,
        now_local: clock.now_local,
        service_count_today: service_count,
        chosen_trip_id: selected.as_ref().map(|s| s.span.trip_id.clone()),
        trip_start_secs: selected.as_ref().map(|s| s.span.start_secs),
        trip_end_secs: selected.as_ref().map(|s| s.span.end_secs),
        trip_in_progress: selected.as_ref().is_some_and(|s| s.in_progress),
        prev_stop_seq: position.as_ref().map(|p| p.prev_stop_seq),
        next_stop_seq: position.as_ref().map(|p| p.next_stop_seq),
        progress_pct: position.as_ref().map(|p| p.progress_pct),
        position: position.as_ref().map(|p| PositionBody {
            lng: p.position.lng,
            lat: p.position.lat,
            bearing: p.bearing,
        }),
        stops,
        nearest_stop: nearest,
    }
}

fn store_error_response(err: StoreError, message: &str) -> Response {
    error!("{}: {}", message, err);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn estimate_error_response(err: EstimateError) -> Response {
    error!("estimate failed: {}", err);
    let status = match err {
        EstimateError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        EstimateError::Timeout => StatusCode::GATEWAY_TIMEOUT,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

/// A direction value that does not parse falls back to direction 0, the
/// same as an absent one.
fn parse_direction(raw: Option<&str>) -> u8 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

fn parse_epoch(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Rider coordinates must both be present, parseable, and in range;
/// anything else means the configured fallback coordinate is used.
fn parse_rider(lat: Option<&str>, lon: Option<&str>) -> Option<GeoPoint> {
    let lat: f64 = lat?.trim().parse().ok()?;
    let lon: f64 = lon?.trim().parse().ok()?;
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(GeoPoint { lng: lon, lat })
}
