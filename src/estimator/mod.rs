pub mod eta;
pub mod geo;
pub mod position;
pub mod selector;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

use crate::estimator::eta::{NearestStop, StopEta};
use crate::estimator::geo::GeoPoint;
use crate::estimator::position::PositionEstimate;
use crate::estimator::selector::SelectedTrip;
use crate::store::{ScheduleStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("estimate timed out")]
    Timeout,
}

/// The request's reference instant resolved into the agency's civil time.
#[derive(Debug, Clone)]
pub struct LocalClock {
    pub epoch_secs: i64,
    pub now_secs: u32,
    pub now_local: String,
    pub date: NaiveDate,
}

/// Resolve an optional epoch-seconds reference into [`LocalClock`];
/// absent (or unrepresentable) values mean "now".
pub fn resolve_clock(tz: Tz, at_epoch: Option<i64>) -> LocalClock {
    let utc = at_epoch
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);
    let local = utc.with_timezone(&tz);

    LocalClock {
        epoch_secs: utc.timestamp(),
        now_secs: local.num_seconds_from_midnight(),
        now_local: local.format("%Y-%m-%d %H:%M:%S").to_string(),
        date: local.date_naive(),
    }
}

/// What the API layer hands the pipeline after boundary validation.
#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub route_id: String,
    pub direction_id: u8,
    pub at_epoch: Option<i64>,
    pub rider: Option<GeoPoint>,
}

/// The merged estimation outcome. `position` is present only when the
/// representative shape and the trip's timed stops are thick enough to
/// place a vehicle; everything else is valid on its own.
#[derive(Debug)]
pub struct Estimate {
    pub clock: LocalClock,
    pub service_count: usize,
    pub selected: Option<SelectedTrip>,
    pub position: Option<PositionEstimate>,
    pub stops: Vec<StopEta>,
    pub nearest: Option<NearestStop>,
}

/// The full pipeline: resolve the clock, find today's active services,
/// select a trip, then estimate the position and annotate ETAs for it.
/// Each stage is a pure read; store failures propagate instead of
/// degrading into defaults.
pub fn run_estimate(
    store: &dyn ScheduleStore,
    tz: Tz,
    fallback_rider: GeoPoint,
    request: &EstimateRequest,
) -> Result<Estimate, EstimateError> {
    let clock = resolve_clock(tz, request.at_epoch);

    // An empty active set is a service-less day, which flows through as
    // "no trip available" rather than an error.
    let services = store.active_services(clock.date)?;
    let trips = store.trips_for(&request.route_id, request.direction_id, &services)?;
    let spans = store.spans_for(&trips)?;
    let selected = selector::select_trip(&spans, clock.now_secs);

    let rider = request.rider.unwrap_or(fallback_rider);
    let ordered = store.ordered_stops(&request.route_id, request.direction_id)?;
    let nearest = eta::nearest_stop(&ordered, rider);

    let (position, stops) = match &selected {
        Some(selection) => {
            let timed = store.timed_stops(&selection.span.trip_id)?;

            let shape = match store.representative(&request.route_id, request.direction_id)? {
                Some(rep) => match rep.shape_id {
                    Some(shape_id) => store.shape_points(&shape_id)?,
                    None => Vec::new(),
                },
                None => Vec::new(),
            };

            let position = position::estimate_position(&shape, &timed, clock.now_secs);
            let nearest_id = nearest.as_ref().map(|n| n.stop_id.as_str());
            let stops = eta::annotate_etas(&timed, clock.now_secs, nearest_id);
            (position, stops)
        }
        None => (None, Vec::new()),
    };

    Ok(Estimate {
        clock,
        service_count: services.len(),
        selected,
        position,
        stops,
        nearest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::TimeZone;
    use chrono_tz::America::Denver;

    use crate::gtfs::calendar::ServicePattern;
    use crate::gtfs::{
        OrderedStop, Route, RouteRepresentative, ScheduleTables, ShapePoint, Stop, StopTime,
        TimedStop, Trip, TripSpan,
    };
    use crate::store::MemoryStore;

    const FALLBACK: GeoPoint = GeoPoint { lng: -105.2705, lat: 40.0150 };

    /// Epoch seconds for a Denver wall-clock time on 2024-06-05, a
    /// Wednesday.
    fn denver_epoch(hour: u32, min: u32, sec: u32) -> i64 {
        Denver
            .with_ymd_and_hms(2024, 6, 5, hour, min, sec)
            .unwrap()
            .timestamp()
    }

    fn request(at_epoch: i64) -> EstimateRequest {
        EstimateRequest {
            route_id: "R1".to_string(),
            direction_id: 0,
            at_epoch: Some(at_epoch),
            rider: None,
        }
    }

    fn fixture_store() -> MemoryStore {
        let weekday = ServicePattern {
            service_id: "WK".to_string(),
            weekdays: [true, true, true, true, true, false, false],
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        };

        let tables = ScheduleTables {
            routes: vec![Route {
                route_id: "R1".to_string(),
                short_name: "204".to_string(),
                long_name: "Table Mesa".to_string(),
            }],
            stops: [
                ("s1", -105.27, 40.01),
                ("s2", -105.26, 40.02),
            ]
            .into_iter()
            .map(|(id, lon, lat)| {
                (
                    id.to_string(),
                    Stop {
                        stop_id: id.to_string(),
                        name: format!("{} name", id),
                        lat,
                        lon,
                    },
                )
            })
            .collect(),
            shapes: [(
                "sh1".to_string(),
                vec![
                    ShapePoint { sequence: 1, lon: -105.27, lat: 40.01 },
                    ShapePoint { sequence: 2, lon: -105.26, lat: 40.02 },
                ],
            )]
            .into_iter()
            .collect(),
            trips: vec![Trip {
                trip_id: "t1".to_string(),
                route_id: "R1".to_string(),
                direction_id: 0,
                service_id: "WK".to_string(),
                shape_id: Some("sh1".to_string()),
                stop_times: vec![
                    StopTime {
                        stop_id: "s1".to_string(),
                        sequence: 1,
                        departure_secs: Some(28800),
                    },
                    StopTime {
                        stop_id: "s2".to_string(),
                        sequence: 2,
                        departure_secs: Some(32400),
                    },
                ],
            }],
            patterns: vec![weekday],
            exceptions: Vec::new(),
        };

        MemoryStore::build(tables)
    }

    #[test]
    fn resolve_clock_converts_to_agency_local_time() {
        let clock = resolve_clock(Denver, Some(denver_epoch(8, 3, 20)));

        assert_eq!(clock.now_secs, 29000);
        assert_eq!(clock.date, chrono::NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());
        assert_eq!(clock.now_local, "2024-06-05 08:03:20");
    }

    #[test]
    fn selects_the_running_trip_and_places_it() {
        let store = fixture_store();
        let estimate =
            run_estimate(&store, Denver, FALLBACK, &request(denver_epoch(8, 3, 20))).unwrap();

        let selected = estimate.selected.unwrap();
        assert_eq!(selected.span.trip_id, "t1");
        assert!(selected.in_progress);
        assert_eq!(estimate.service_count, 1);

        let position = estimate.position.unwrap();
        assert_eq!(position.prev_stop_seq, 1);
        assert_eq!(position.next_stop_seq, 2);
        assert!(position.progress_pct <= 100);

        assert_eq!(estimate.stops.len(), 2);
        assert_eq!(estimate.stops[0].eta_label, "Departed");
    }

    #[test]
    fn weekends_have_no_service_and_no_trip() {
        let store = fixture_store();
        // 2024-06-08 is a Saturday
        let saturday = Denver
            .with_ymd_and_hms(2024, 6, 8, 8, 0, 0)
            .unwrap()
            .timestamp();

        let estimate = run_estimate(&store, Denver, FALLBACK, &request(saturday)).unwrap();

        assert_eq!(estimate.service_count, 0);
        assert!(estimate.selected.is_none());
        assert!(estimate.position.is_none());
        assert!(estimate.stops.is_empty());
        // nearest stop still resolves from the ordered stop list
        assert!(estimate.nearest.is_some());
    }

    #[test]
    fn rider_location_drives_the_nearest_flag() {
        let store = fixture_store();
        let mut req = request(denver_epoch(8, 3, 20));
        req.rider = Some(GeoPoint { lng: -105.26, lat: 40.0201 });

        let estimate = run_estimate(&store, Denver, FALLBACK, &req).unwrap();

        let nearest = estimate.nearest.unwrap();
        assert_eq!(nearest.stop_id, "s2");
        assert!(nearest.distance_m < 100.0);
        assert!(estimate.stops.iter().any(|s| s.stop_id == "s2" && s.is_nearest));
    }

    struct FailingStore;

    impl ScheduleStore for FailingStore {
        fn active_services(&self, _: chrono::NaiveDate) -> Result<HashSet<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn trips_for(
            &self,
            _: &str,
            _: u8,
            _: &HashSet<String>,
        ) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn spans_for(&self, _: &[String]) -> Result<Vec<TripSpan>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn representative(
            &self,
            _: &str,
            _: u8,
        ) -> Result<Option<RouteRepresentative>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn shape_points(&self, _: &str) -> Result<Vec<ShapePoint>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn timed_stops(&self, _: &str) -> Result<Vec<TimedStop>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn ordered_stops(&self, _: &str, _: u8) -> Result<Vec<OrderedStop>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn routes(&self) -> Result<Vec<Route>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn directions_for(&self, _: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn store_failures_propagate_as_errors() {
        let result = run_estimate(
            &FailingStore,
            Denver,
            FALLBACK,
            &request(denver_epoch(8, 0, 0)),
        );

        assert!(matches!(result, Err(EstimateError::Store(_))));
    }
}
