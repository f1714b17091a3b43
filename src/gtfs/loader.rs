use std::collections::HashMap;
use std::io::{Cursor, Read};

use chrono::NaiveDate;
use log::{info, warn};

use crate::gtfs::calendar::{ServiceException, ServicePattern};
use crate::gtfs::{Route, ScheduleTables, ShapePoint, Stop, StopTime, Trip};

type LoadError = Box<dyn std::error::Error + Send + Sync>;

const WEEKDAY_COLUMNS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Load a GTFS archive from a local path or an HTTP(S) URL and parse the
/// tables the estimator consumes.
pub async fn load_schedule(source: &str) -> Result<ScheduleTables, LoadError> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        info!("downloading GTFS feed from {}", source);
        let response = reqwest::get(source).await?;
        response.bytes().await?.to_vec()
    } else {
        info!("reading GTFS feed from {}", source);
        tokio::fs::read(source).await?
    };

    info!("read {} bytes, extracting", bytes.len());

    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)?;

    let routes = parse_routes(&read_member(&mut archive, "routes.txt")?)?;
    let stops = parse_stops(&read_member(&mut archive, "stops.txt")?)?;
    let mut trips = parse_trips(&read_member(&mut archive, "trips.txt")?)?;
    let mut stop_times = parse_stop_times(&read_member(&mut archive, "stop_times.txt")?)?;

    // shapes.txt is optional; routes without one simply get no position.
    let shapes = match read_member(&mut archive, "shapes.txt") {
        Ok(content) => parse_shapes(&content)?,
        Err(_) => {
            warn!("feed has no shapes.txt; position estimation will be metadata-only");
            HashMap::new()
        }
    };

    // calendar.txt and calendar_dates.txt are each optional, but a feed
    // must carry at least one of them.
    let patterns = match read_member(&mut archive, "calendar.txt") {
        Ok(content) => parse_calendar(&content)?,
        Err(_) => Vec::new(),
    };
    let exceptions = match read_member(&mut archive, "calendar_dates.txt") {
        Ok(content) => parse_calendar_dates(&content)?,
        Err(_) => Vec::new(),
    };
    if patterns.is_empty() && exceptions.is_empty() {
        return Err("feed has neither calendar.txt nor calendar_dates.txt".into());
    }

    for trip in &mut trips {
        trip.stop_times = stop_times.remove(&trip.trip_id).unwrap_or_default();
    }

    Ok(ScheduleTables {
        routes,
        stops,
        shapes,
        trips,
        patterns,
        exceptions,
    })
}

fn read_member(
    archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>,
    name: &str,
) -> Result<String, LoadError> {
    let mut file = archive.by_name(name)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

fn parse_routes(content: &str) -> Result<Vec<Route>, LoadError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let route_id = require_column(&headers, "route_id")?;
    let short_name = require_column(&headers, "route_short_name")?;
    let long_name = require_column(&headers, "route_long_name")?;

    let mut routes = Vec::new();
    for result in reader.records() {
        let record = result?;
        routes.push(Route {
            route_id: field(&record, route_id),
            short_name: field(&record, short_name),
            long_name: field(&record, long_name),
        });
    }

    Ok(routes)
}

fn parse_stops(content: &str) -> Result<HashMap<String, Stop>, LoadError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let stop_id = require_column(&headers, "stop_id")?;
    let name = require_column(&headers, "stop_name")?;
    let lat = require_column(&headers, "stop_lat")?;
    let lon = require_column(&headers, "stop_lon")?;

    let mut stops = HashMap::new();
    for result in reader.records() {
        let record = result?;
        let id = field(&record, stop_id);
        stops.insert(
            id.clone(),
            Stop {
                stop_id: id,
                name: field(&record, name),
                lat: field(&record, lat).parse().unwrap_or(0.0),
                lon: field(&record, lon).parse().unwrap_or(0.0),
            },
        );
    }

    Ok(stops)
}

fn parse_trips(content: &str) -> Result<Vec<Trip>, LoadError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let route_id = require_column(&headers, "route_id")?;
    let service_id = require_column(&headers, "service_id")?;
    let trip_id = require_column(&headers, "trip_id")?;
    let direction_id = optional_column(&headers, "direction_id");
    let shape_id = optional_column(&headers, "shape_id");

    let mut trips = Vec::new();
    for result in reader.records() {
        let record = result?;
        trips.push(Trip {
            trip_id: field(&record, trip_id),
            route_id: field(&record, route_id),
            service_id: field(&record, service_id),
            // An empty direction field defaults to direction 0.
            direction_id: optional_field(&record, direction_id)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            shape_id: optional_field(&record, shape_id),
            stop_times: Vec::new(),
        });
    }

    Ok(trips)
}

fn parse_stop_times(content: &str) -> Result<HashMap<String, Vec<StopTime>>, LoadError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let trip_id = require_column(&headers, "trip_id")?;
    let departure = require_column(&headers, "departure_time")?;
    let stop_id = require_column(&headers, "stop_id")?;
    let sequence = require_column(&headers, "stop_sequence")?;

    let mut stop_times: HashMap<String, Vec<StopTime>> = HashMap::new();
    for result in reader.records() {
        let record = result?;
        stop_times
            .entry(field(&record, trip_id))
            .or_default()
            .push(StopTime {
                stop_id: field(&record, stop_id),
                sequence: field(&record, sequence).parse().unwrap_or(0),
                departure_secs: parse_time_to_secs(&field(&record, departure)),
            });
    }

    for times in stop_times.values_mut() {
        times.sort_by_key(|st| st.sequence);
    }

    Ok(stop_times)
}

fn parse_shapes(content: &str) -> Result<HashMap<String, Vec<ShapePoint>>, LoadError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let shape_id = require_column(&headers, "shape_id")?;
    let lat = require_column(&headers, "shape_pt_lat")?;
    let lon = require_column(&headers, "shape_pt_lon")?;
    let sequence = require_column(&headers, "shape_pt_sequence")?;

    let mut shapes: HashMap<String, Vec<ShapePoint>> = HashMap::new();
    for result in reader.records() {
        let record = result?;
        shapes
            .entry(field(&record, shape_id))
            .or_default()
            .push(ShapePoint {
                sequence: field(&record, sequence).parse().unwrap_or(0),
                lat: field(&record, lat).parse().unwrap_or(0.0),
                lon: field(&record, lon).parse().unwrap_or(0.0),
            });
    }

    for points in shapes.values_mut() {
        points.sort_by_key(|p| p.sequence);
    }

    Ok(shapes)
}

fn parse_calendar(content: &str) -> Result<Vec<ServicePattern>, LoadError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let service_id = require_column(&headers, "service_id")?;
    let start_date = require_column(&headers, "start_date")?;
    let end_date = require_column(&headers, "end_date")?;
    let mut day_columns = [0usize; 7];
    for (i, name) in WEEKDAY_COLUMNS.iter().enumerate() {
        day_columns[i] = require_column(&headers, name)?;
    }

    let mut patterns = Vec::new();
    for result in reader.records() {
        let record = result?;
        let id = field(&record, service_id);
        let (Some(start), Some(end)) = (
            parse_date(&field(&record, start_date)),
            parse_date(&field(&record, end_date)),
        ) else {
            warn!("skipping calendar row for service {} with bad dates", id);
            continue;
        };

        let mut weekdays = [false; 7];
        for (i, col) in day_columns.iter().enumerate() {
            weekdays[i] = field(&record, *col) == "1";
        }

        patterns.push(ServicePattern {
            service_id: id,
            weekdays,
            start_date: start,
            end_date: end,
        });
    }

    Ok(patterns)
}

fn parse_calendar_dates(content: &str) -> Result<Vec<ServiceException>, LoadError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let service_id = require_column(&headers, "service_id")?;
    let date = require_column(&headers, "date")?;
    let exception_type = require_column(&headers, "exception_type")?;

    let mut exceptions = Vec::new();
    for result in reader.records() {
        let record = result?;
        let id = field(&record, service_id);
        let Some(day) = parse_date(&field(&record, date)) else {
            warn!("skipping calendar_dates row for service {} with bad date", id);
            continue;
        };

        exceptions.push(ServiceException {
            service_id: id,
            date: day,
            added: field(&record, exception_type) == "1",
        });
    }

    Ok(exceptions)
}

/// Column positions vary between feeds, so resolve them from the header
/// row. The first header may carry a UTF-8 BOM.
fn require_column(headers: &csv::StringRecord, name: &str) -> Result<usize, LoadError> {
    optional_column(headers, name).ok_or_else(|| format!("missing column {}", name).into())
}

fn optional_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
}

fn field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

fn optional_field(record: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    let value = record.get(index?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

/// GTFS times can exceed 24:00:00 for trips running past midnight.
fn parse_time_to_secs(time_str: &str) -> Option<u32> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() >= 2 {
        let hours: u32 = parts[0].trim().parse().ok()?;
        let mins: u32 = parts[1].parse().ok()?;
        let secs: u32 = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
        Some(hours * 3600 + mins * 60 + secs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_times_past_midnight() {
        assert_eq!(parse_time_to_secs("08:00:00"), Some(28800));
        assert_eq!(parse_time_to_secs("25:30:00"), Some(91800));
        assert_eq!(parse_time_to_secs("7:05"), Some(25500));
        assert_eq!(parse_time_to_secs(""), None);
        assert_eq!(parse_time_to_secs("bogus"), None);
    }

    #[test]
    fn resolves_columns_by_header_name() {
        let content = "\u{feff}route_id,route_short_name,route_long_name\nR1,204,Table Mesa\n";
        let routes = parse_routes(content).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].route_id, "R1");
        assert_eq!(routes[0].short_name, "204");
    }

    #[test]
    fn empty_departure_times_parse_to_none() {
        let content = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
                       t1,08:00:00,08:00:00,s1,1\n\
                       t1,,,s2,2\n\
                       t1,08:10:00,08:10:00,s3,3\n";
        let stop_times = parse_stop_times(content).unwrap();
        let times = &stop_times["t1"];
        assert_eq!(times.len(), 3);
        assert_eq!(times[0].departure_secs, Some(28800));
        assert_eq!(times[1].departure_secs, None);
        assert_eq!(times[2].departure_secs, Some(29400));
    }

    #[test]
    fn trips_default_direction_to_zero() {
        let content = "route_id,service_id,trip_id,direction_id,shape_id\n\
                       R1,WK,t1,,\n\
                       R1,WK,t2,1,sh1\n";
        let trips = parse_trips(content).unwrap();
        assert_eq!(trips[0].direction_id, 0);
        assert_eq!(trips[0].shape_id, None);
        assert_eq!(trips[1].direction_id, 1);
        assert_eq!(trips[1].shape_id.as_deref(), Some("sh1"));
    }
}
