pub mod memory;

pub use memory::MemoryStore;

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::gtfs::{OrderedStop, Route, RouteRepresentative, ShapePoint, TimedStop, TripSpan};

/// Read failure from the backing tables. The in-memory store never produces
/// one; a database-backed implementation would, and callers must treat it
/// as retryable rather than substituting defaults.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("schedule storage unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the prepared schedule tables. The estimation pipeline is
/// written against this trait so tests inject fixture data instead of a
/// loaded feed.
pub trait ScheduleStore: Send + Sync {
    /// Service ids active on the given calendar date. An empty set means no
    /// service runs that day; it is a valid outcome, not an error.
    fn active_services(&self, date: NaiveDate) -> Result<HashSet<String>, StoreError>;

    /// Trip ids on a route/direction whose service id is in the active set.
    fn trips_for(
        &self,
        route_id: &str,
        direction_id: u8,
        services: &HashSet<String>,
    ) -> Result<Vec<String>, StoreError>;

    /// Departure spans for the given trips. Trips without a timed stop
    /// produce no span.
    fn spans_for(&self, trip_ids: &[String]) -> Result<Vec<TripSpan>, StoreError>;

    /// The precomputed representative trip/shape for a route/direction.
    fn representative(
        &self,
        route_id: &str,
        direction_id: u8,
    ) -> Result<Option<RouteRepresentative>, StoreError>;

    /// Ordered points of one shape polyline.
    fn shape_points(&self, shape_id: &str) -> Result<Vec<ShapePoint>, StoreError>;

    /// A trip's stops that carry a scheduled departure, in sequence order,
    /// joined with their coordinates.
    fn timed_stops(&self, trip_id: &str) -> Result<Vec<TimedStop>, StoreError>;

    /// The route/direction's ordered stop list, timed or not.
    fn ordered_stops(
        &self,
        route_id: &str,
        direction_id: u8,
    ) -> Result<Vec<OrderedStop>, StoreError>;

    /// All routes in display order.
    fn routes(&self) -> Result<Vec<Route>, StoreError>;

    /// Direction ids with a representative on this route, ascending.
    fn directions_for(&self, route_id: &str) -> Result<Vec<u8>, StoreError>;
}
