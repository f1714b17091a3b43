use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};

/// One row of calendar.txt: a weekday pattern over a date range.
/// `weekdays` is indexed Monday..Sunday.
#[derive(Debug, Clone)]
pub struct ServicePattern {
    pub service_id: String,
    pub weekdays: [bool; 7],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ServicePattern {
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        if date < self.start_date || date > self.end_date {
            return false;
        }
        self.weekdays[date.weekday().num_days_from_monday() as usize]
    }
}

/// One row of calendar_dates.txt: an explicit per-date exception.
/// `exception_type` 1 adds service on the date, 2 removes it.
#[derive(Debug, Clone)]
pub struct ServiceException {
    pub service_id: String,
    pub date: NaiveDate,
    pub added: bool,
}

/// Resolve weekday patterns and exceptions into the per-date active-service
/// table the estimator reads. Removals override the pattern; explicit
/// additions win when a feed lists both for the same date.
pub fn resolve_service_dates(
    patterns: &[ServicePattern],
    exceptions: &[ServiceException],
) -> HashMap<NaiveDate, HashSet<String>> {
    let mut active: HashMap<NaiveDate, HashSet<String>> = HashMap::new();

    for pattern in patterns {
        let mut date = pattern.start_date;
        while date <= pattern.end_date {
            if pattern.runs_on(date) {
                active
                    .entry(date)
                    .or_default()
                    .insert(pattern.service_id.clone());
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
    }

    for exception in exceptions.iter().filter(|e| !e.added) {
        if let Some(services) = active.get_mut(&exception.date) {
            services.remove(&exception.service_id);
        }
    }
    for exception in exceptions.iter().filter(|e| e.added) {
        active
            .entry(exception.date)
            .or_default()
            .insert(exception.service_id.clone());
    }

    active
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekday_pattern() -> ServicePattern {
        ServicePattern {
            service_id: "WK".to_string(),
            weekdays: [true, true, true, true, true, false, false],
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
        }
    }

    #[test]
    fn pattern_respects_weekday_bits_and_range() {
        let pattern = weekday_pattern();

        assert!(pattern.runs_on(date(2024, 1, 2))); // Tuesday
        assert!(!pattern.runs_on(date(2024, 1, 6))); // Saturday
        assert!(!pattern.runs_on(date(2025, 1, 1))); // past end_date
    }

    #[test]
    fn exceptions_add_and_remove_service() {
        let patterns = vec![weekday_pattern()];
        let exceptions = vec![
            ServiceException {
                service_id: "WK".to_string(),
                date: date(2024, 7, 4), // Thursday holiday
                added: false,
            },
            ServiceException {
                service_id: "SA".to_string(),
                date: date(2024, 7, 4), // holiday runs the Saturday schedule
                added: true,
            },
        ];

        let resolved = resolve_service_dates(&patterns, &exceptions);

        let holiday = resolved.get(&date(2024, 7, 4)).unwrap();
        assert!(!holiday.contains("WK"));
        assert!(holiday.contains("SA"));

        let ordinary = resolved.get(&date(2024, 7, 3)).unwrap();
        assert!(ordinary.contains("WK"));
    }

    #[test]
    fn dates_without_service_resolve_to_no_entry() {
        let resolved = resolve_service_dates(&[weekday_pattern()], &[]);
        // Saturdays never get an entry; readers treat that as an empty set.
        assert!(!resolved.contains_key(&date(2024, 1, 6)));
    }
}
