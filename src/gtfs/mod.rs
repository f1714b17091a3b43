pub mod calendar;
pub mod loader;
pub mod types;

pub use types::{
    OrderedStop, Route, RouteRepresentative, ScheduleTables, ShapePoint, Stop, StopTime,
    TimedStop, Trip, TripSpan,
};
