use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

/// Half-open `[start, end)` interval matched by a time query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Accepts `YYYY-MM-DD` (the whole day) or `YYYY-MM-DD HH:MM` (that minute), in UTC.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        if let Ok(minute) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M") {
            let start = minute.and_utc();
            return Some(Self { start, end: start + Duration::minutes(1) });
        }

        let day = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
        let start = day.and_hms_opt(0, 0, 0)?.and_utc();
        Some(Self { start, end: start + Duration::days(1) })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct JourneyFilter {
    pub route: Option<Uuid>,
    pub departure: Option<TimeWindow>,
    pub arrival: Option<TimeWindow>,
    /// Restrict to these journeys, used when expanding tickets in order listings
    pub ids: Option<Vec<Uuid>>,
}

/// Routes whose source (or destination) is any of the listed stations.
/// An empty list means no restriction.
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    pub source: Vec<Uuid>,
    pub destination: Vec<Uuid>,
}

impl RouteFilter {
    pub fn matches(&self, source_id: Uuid, destination_id: Uuid) -> bool {
        (self.source.is_empty() || self.source.contains(&source_id))
            && (self.destination.is_empty() || self.destination.contains(&destination_id))
    }
}

/// Parse a comma separated id list such as `?source=<uuid>,<uuid>`.
pub fn parse_id_list(value: &str) -> Result<Vec<Uuid>, uuid::Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Uuid::parse_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_window() {
        let window = TimeWindow::parse("2024-12-26").unwrap();
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 12, 26, 0, 0, 0).unwrap()));
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 12, 26, 23, 59, 59).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 12, 27, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_minute_window() {
        let window = TimeWindow::parse("2024-12-26 14:44").unwrap();
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 12, 26, 14, 44, 30).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 12, 26, 14, 45, 0).unwrap()));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(TimeWindow::parse("tomorrow").is_none());
        assert!(parse_id_list("1,2").is_err());
    }

    #[test]
    fn test_route_filter() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let filter = RouteFilter { source: vec![a], destination: vec![] };
        assert!(filter.matches(a, b));
        assert!(!filter.matches(c, b));

        let ids = parse_id_list(&format!("{a}, {b}")).unwrap();
        assert_eq!(ids, vec![a, b]);
    }
}
