use crate::gtfs::TripSpan;

/// The trip chosen for "now" and whether now falls inside its departure
/// window.
#[derive(Debug, Clone)]
pub struct SelectedTrip {
    pub span: TripSpan,
    pub in_progress: bool,
}

/// Selection policy: a trip whose window contains `now_secs` wins (the
/// earliest-starting one when several overlap), otherwise the soonest
/// upcoming trip, otherwise wrap around to the earliest trip of the day.
/// No candidates means no selection.
pub fn select_trip(spans: &[TripSpan], now_secs: u32) -> Option<SelectedTrip> {
    let mut ordered: Vec<&TripSpan> = spans.iter().collect();
    // Deterministic regardless of store iteration order.
    ordered.sort_by(|a, b| {
        (a.start_secs, a.trip_id.as_str()).cmp(&(b.start_secs, b.trip_id.as_str()))
    });

    if let Some(current) = ordered
        .iter()
        .find(|s| s.start_secs <= now_secs && now_secs <= s.end_secs)
    {
        return Some(SelectedTrip {
            span: (*current).clone(),
            in_progress: true,
        });
    }

    if let Some(upcoming) = ordered.iter().find(|s| s.start_secs > now_secs) {
        return Some(SelectedTrip {
            span: (*upcoming).clone(),
            in_progress: false,
        });
    }

    ordered.first().map(|s| SelectedTrip {
        span: (*s).clone(),
        in_progress: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(trip_id: &str, start_secs: u32, end_secs: u32) -> TripSpan {
        TripSpan {
            trip_id: trip_id.to_string(),
            start_secs,
            end_secs,
        }
    }

    #[test]
    fn picks_the_trip_in_progress() {
        // 08:00-09:00 window, asked at 08:03:20
        let spans = [span("t1", 28800, 32400)];
        let selected = select_trip(&spans, 29000).unwrap();

        assert_eq!(selected.span.trip_id, "t1");
        assert!(selected.in_progress);
    }

    #[test]
    fn overlapping_windows_resolve_to_the_earliest_start() {
        let spans = [span("late", 28800, 32400), span("early", 28000, 33000)];
        let selected = select_trip(&spans, 29000).unwrap();

        assert_eq!(selected.span.trip_id, "early");
        assert!(selected.in_progress);
    }

    #[test]
    fn falls_forward_to_the_soonest_upcoming_trip() {
        let spans = [span("second", 28800, 32400), span("first", 25200, 27000)];
        let selected = select_trip(&spans, 20000).unwrap();

        assert_eq!(selected.span.trip_id, "first");
        assert!(!selected.in_progress);
    }

    #[test]
    fn wraps_to_the_earliest_trip_after_the_day_ends() {
        let spans = [span("noon", 43200, 46800), span("dawn", 21600, 25200)];
        let selected = select_trip(&spans, 80000).unwrap();

        assert_eq!(selected.span.trip_id, "dawn");
        assert!(!selected.in_progress);
    }

    #[test]
    fn no_candidates_means_no_selection() {
        assert!(select_trip(&[], 29000).is_none());
    }

    #[test]
    fn selection_does_not_depend_on_input_order() {
        let forward = [span("a", 28000, 33000), span("b", 28800, 32400)];
        let reversed = [span("b", 28800, 32400), span("a", 28000, 33000)];

        let from_forward = select_trip(&forward, 29000).unwrap();
        let from_reversed = select_trip(&reversed, 29000).unwrap();
        assert_eq!(from_forward.span.trip_id, from_reversed.span.trip_id);
    }

    #[test]
    fn window_edges_count_as_in_progress() {
        let spans = [span("t1", 28800, 32400)];
        assert!(select_trip(&spans, 28800).unwrap().in_progress);
        assert!(select_trip(&spans, 32400).unwrap().in_progress);
        assert!(!select_trip(&spans, 32401).unwrap().in_progress);
    }
}
