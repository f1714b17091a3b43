use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use log::warn;

use crate::gtfs::calendar::resolve_service_dates;
use crate::gtfs::{
    OrderedStop, Route, RouteRepresentative, ScheduleTables, ShapePoint, Stop, TimedStop, Trip,
    TripSpan,
};
use crate::store::{ScheduleStore, StoreError};

/// In-memory implementation of [`ScheduleStore`]. Built once at startup
/// from the parsed feed tables; every request reads it immutably.
pub struct MemoryStore {
    routes: Vec<Route>,
    stops: HashMap<String, Stop>,
    shapes: HashMap<String, Vec<ShapePoint>>,
    trips: HashMap<String, Trip>,
    trips_by_route_dir: HashMap<(String, u8), Vec<String>>,
    service_dates: HashMap<NaiveDate, HashSet<String>>,
    representatives: HashMap<(String, u8), RouteRepresentative>,
    route_stops: HashMap<(String, u8), Vec<OrderedStop>>,
}

impl MemoryStore {
    /// Derive the helper tables the estimator consumes: the per-date
    /// active-service table, one representative trip/shape per
    /// (route, direction), and each representative's ordered stop list.
    pub fn build(tables: ScheduleTables) -> Self {
        let ScheduleTables {
            mut routes,
            stops,
            shapes,
            trips,
            patterns,
            exceptions,
        } = tables;

        routes.sort_by(|a, b| route_order(a).cmp(&route_order(b)));

        let service_dates = resolve_service_dates(&patterns, &exceptions);

        let mut trips_by_route_dir: HashMap<(String, u8), Vec<String>> = HashMap::new();
        for trip in &trips {
            trips_by_route_dir
                .entry((trip.route_id.clone(), trip.direction_id))
                .or_default()
                .push(trip.trip_id.clone());
        }

        // Representative per (route, direction): the trip with the fullest
        // timed stop pattern, smallest trip id on ties.
        let mut best: HashMap<(String, u8), (usize, &Trip)> = HashMap::new();
        for trip in &trips {
            let timed = trip
                .stop_times
                .iter()
                .filter(|st| st.departure_secs.is_some())
                .count();
            let key = (trip.route_id.clone(), trip.direction_id);
            let keep_current = best.get(&key).is_some_and(|(best_timed, best_trip)| {
                *best_timed > timed
                    || (*best_timed == timed && best_trip.trip_id <= trip.trip_id)
            });
            if !keep_current {
                best.insert(key, (timed, trip));
            }
        }

        let representatives: HashMap<(String, u8), RouteRepresentative> = best
            .into_iter()
            .map(|(key, (_, trip))| {
                (
                    key,
                    RouteRepresentative {
                        route_id: trip.route_id.clone(),
                        direction_id: trip.direction_id,
                        trip_id: trip.trip_id.clone(),
                        shape_id: trip.shape_id.clone(),
                    },
                )
            })
            .collect();

        let trips: HashMap<String, Trip> = trips
            .into_iter()
            .map(|t| (t.trip_id.clone(), t))
            .collect();

        let mut route_stops: HashMap<(String, u8), Vec<OrderedStop>> = HashMap::new();
        for (key, rep) in &representatives {
            let Some(trip) = trips.get(&rep.trip_id) else {
                continue;
            };
            let mut ordered = Vec::new();
            for st in &trip.stop_times {
                match stops.get(&st.stop_id) {
                    Some(stop) => ordered.push(OrderedStop {
                        stop_id: stop.stop_id.clone(),
                        name: stop.name.clone(),
                        lon: stop.lon,
                        lat: stop.lat,
                        sequence: st.sequence,
                    }),
                    None => warn!("trip {} references unknown stop {}", rep.trip_id, st.stop_id),
                }
            }
            route_stops.insert(key.clone(), ordered);
        }

        Self {
            routes,
            stops,
            shapes,
            trips,
            trips_by_route_dir,
            service_dates,
            representatives,
            route_stops,
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }
}

impl ScheduleStore for MemoryStore {
    fn active_services(&self, date: NaiveDate) -> Result<HashSet<String>, StoreError> {
        Ok(self.service_dates.get(&date).cloned().unwrap_or_default())
    }

    fn trips_for(
        &self,
        route_id: &str,
        direction_id: u8,
        services: &HashSet<String>,
    ) -> Result<Vec<String>, StoreError> {
        let key = (route_id.to_string(), direction_id);
        let ids = self
            .trips_by_route_dir
            .get(&key)
            .map(|trip_ids| {
                trip_ids
                    .iter()
                    .filter(|id| {
                        self.trips
                            .get(*id)
                            .is_some_and(|t| services.contains(&t.service_id))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    fn spans_for(&self, trip_ids: &[String]) -> Result<Vec<TripSpan>, StoreError> {
        Ok(trip_ids
            .iter()
            .filter_map(|id| self.trips.get(id).and_then(Trip::span))
            .collect())
    }

    fn representative(
        &self,
        route_id: &str,
        direction_id: u8,
    ) -> Result<Option<RouteRepresentative>, StoreError> {
        let key = (route_id.to_string(), direction_id);
        Ok(self.representatives.get(&key).cloned())
    }

    fn shape_points(&self, shape_id: &str) -> Result<Vec<ShapePoint>, StoreError> {
        Ok(self.shapes.get(shape_id).cloned().unwrap_or_default())
    }

    fn timed_stops(&self, trip_id: &str) -> Result<Vec<TimedStop>, StoreError> {
        let Some(trip) = self.trips.get(trip_id) else {
            return Ok(Vec::new());
        };

        let mut timed = Vec::new();
        for st in &trip.stop_times {
            let Some(departure_secs) = st.departure_secs else {
                continue;
            };
            let Some(stop) = self.stops.get(&st.stop_id) else {
                continue;
            };
            timed.push(TimedStop {
                stop_id: stop.stop_id.clone(),
                name: stop.name.clone(),
                lon: stop.lon,
                lat: stop.lat,
                sequence: st.sequence,
                departure_secs,
            });
        }
        Ok(timed)
    }

    fn ordered_stops(
        &self,
        route_id: &str,
        direction_id: u8,
    ) -> Result<Vec<OrderedStop>, StoreError> {
        let key = (route_id.to_string(), direction_id);
        Ok(self.route_stops.get(&key).cloned().unwrap_or_default())
    }

    fn routes(&self) -> Result<Vec<Route>, StoreError> {
        Ok(self.routes.clone())
    }

    fn directions_for(&self, route_id: &str) -> Result<Vec<u8>, StoreError> {
        let mut directions: Vec<u8> = self
            .representatives
            .values()
            .filter(|rep| rep.route_id == route_id)
            .map(|rep| rep.direction_id)
            .collect();
        directions.sort_unstable();
        Ok(directions)
    }
}

/// Display ordering from the routes listing: numeric short names first in
/// numeric order, then everything else lexicographically.
fn route_order(route: &Route) -> (bool, u32, String, String) {
    let numeric = route.short_name.parse::<u32>().ok();
    (
        numeric.is_none(),
        numeric.unwrap_or(0),
        route.short_name.clone(),
        route.long_name.clone(),
    )
}
