use std::collections::HashMap;

use crate::gtfs::calendar::{ServiceException, ServicePattern};

#[derive(Debug, Clone)]
pub struct Route {
    pub route_id: String,
    pub short_name: String,
    pub long_name: String,
}

#[derive(Debug, Clone)]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone)]
pub struct StopTime {
    pub stop_id: String,
    pub sequence: u32,
    pub departure_secs: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub direction_id: u8,
    pub service_id: String,
    pub shape_id: Option<String>,
    pub stop_times: Vec<StopTime>,
}

impl Trip {
    /// First/last scheduled departure among this trip's timed stops.
    /// Stop times without a departure do not contribute to the span.
    pub fn span(&self) -> Option<TripSpan> {
        let mut timed = self.stop_times.iter().filter_map(|st| st.departure_secs);
        let first = timed.next()?;
        let (mut start, mut end) = (first, first);
        for secs in timed {
            start = start.min(secs);
            end = end.max(secs);
        }
        Some(TripSpan {
            trip_id: self.trip_id.clone(),
            start_secs: start,
            end_secs: end,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShapePoint {
    pub sequence: u32,
    pub lon: f64,
    pub lat: f64,
}

/// The scheduled departure window of one trip, in seconds since local
/// midnight of the service day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripSpan {
    pub trip_id: String,
    pub start_secs: u32,
    pub end_secs: u32,
}

/// Precomputed (route, direction) -> representative trip/shape mapping,
/// used for shapes and ordered stop lists when no specific trip is in play.
#[derive(Debug, Clone)]
pub struct RouteRepresentative {
    pub route_id: String,
    pub direction_id: u8,
    pub trip_id: String,
    pub shape_id: Option<String>,
}

/// One stop of a route/direction's ordered stop list, timed or not.
#[derive(Debug, Clone)]
pub struct OrderedStop {
    pub stop_id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub sequence: u32,
}

/// A trip stop that carries a scheduled departure, joined with its
/// coordinates.
#[derive(Debug, Clone)]
pub struct TimedStop {
    pub stop_id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub sequence: u32,
    pub departure_secs: u32,
}

/// The parsed feed tables, handed from the loader to the store builder.
#[derive(Debug, Default)]
pub struct ScheduleTables {
    pub routes: Vec<Route>,
    pub stops: HashMap<String, Stop>,
    pub shapes: HashMap<String, Vec<ShapePoint>>,
    pub trips: Vec<Trip>,
    pub patterns: Vec<ServicePattern>,
    pub exceptions: Vec<ServiceException>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_time(sequence: u32, departure_secs: Option<u32>) -> StopTime {
        StopTime {
            stop_id: format!("s{}", sequence),
            sequence,
            departure_secs,
        }
    }

    #[test]
    fn span_covers_min_and_max_timed_departures() {
        let trip = Trip {
            trip_id: "t1".to_string(),
            route_id: "r1".to_string(),
            direction_id: 0,
            service_id: "WK".to_string(),
            shape_id: None,
            stop_times: vec![
                stop_time(1, Some(28800)),
                stop_time(2, None),
                stop_time(3, Some(32400)),
            ],
        };

        let span = trip.span().unwrap();
        assert_eq!(span.start_secs, 28800);
        assert_eq!(span.end_secs, 32400);
    }

    #[test]
    fn span_is_none_without_timed_stops() {
        let trip = Trip {
            trip_id: "t1".to_string(),
            route_id: "r1".to_string(),
            direction_id: 0,
            service_id: "WK".to_string(),
            shape_id: None,
            stop_times: vec![stop_time(1, None), stop_time(2, None)],
        };

        assert!(trip.span().is_none());
    }
}
