//! Structured query filter over captured records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::HttpRecord;

/// Inclusive status code range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl StatusRange {
    pub const SUCCESS: StatusRange = StatusRange { min: 200, max: 299 };
    pub const REDIRECTION: StatusRange = StatusRange { min: 300, max: 399 };
    pub const CLIENT_ERROR: StatusRange = StatusRange { min: 400, max: 499 };
    pub const SERVER_ERROR: StatusRange = StatusRange { min: 500, max: 599 };

    pub fn contains(&self, code: u16) -> bool {
        code >= self.min && code <= self.max
    }
}

/// Window on a record's start time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    LastHour,
    LastDay,
    /// Inclusive on both ends
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match *self {
            TimeRange::LastHour => at >= now - chrono::Duration::hours(1),
            TimeRange::LastDay => at >= now - chrono::Duration::days(1),
            TimeRange::Custom { start, end } => at >= start && at <= end,
        }
    }
}

/// Filter options for querying captured records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Match any of these methods (case-insensitive)
    pub methods: Vec<String>,
    /// Match any of these status ranges
    pub status_ranges: Vec<StatusRange>,
    /// Case-insensitive MIME type substrings
    pub content_types: Vec<String>,
    pub min_duration_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub only_errors: bool,
    pub only_successful: bool,
    /// Case-insensitive host substrings
    pub hosts: Vec<String>,
    pub time_range: Option<TimeRange>,
}

impl RecordFilter {
    pub fn is_active(&self) -> bool {
        !self.methods.is_empty()
            || !self.status_ranges.is_empty()
            || !self.content_types.is_empty()
            || self.min_duration_ms.is_some()
            || self.max_duration_ms.is_some()
            || self.min_size.is_some()
            || self.max_size.is_some()
            || self.only_errors
            || self.only_successful
            || !self.hosts.is_empty()
            || self.time_range.is_some()
    }

    pub fn matches(&self, record: &HttpRecord) -> bool {
        self.matches_at(record, Utc::now())
    }

    /// Like [`matches`](Self::matches) with relative time ranges measured from `now`.
    pub fn matches_at(&self, record: &HttpRecord, now: DateTime<Utc>) -> bool {
        if !self.methods.is_empty()
            && !self
                .methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&record.method))
        {
            return false;
        }

        if !self.status_ranges.is_empty() {
            match record.status_code() {
                Some(code) if self.status_ranges.iter().any(|r| r.contains(code)) => {}
                _ => return false,
            }
        }

        if !self.content_types.is_empty() {
            let Some(mime) = record.mime_type.as_deref() else {
                return false;
            };
            let mime = mime.to_ascii_lowercase();
            if !self
                .content_types
                .iter()
                .any(|ct| mime.contains(&ct.to_ascii_lowercase()))
            {
                return false;
            }
        }

        if self.min_duration_ms.is_some() || self.max_duration_ms.is_some() {
            let Some(duration) = record.duration_ms() else {
                return false;
            };
            if self.min_duration_ms.is_some_and(|min| duration < min) {
                return false;
            }
            if self.max_duration_ms.is_some_and(|max| duration > max) {
                return false;
            }
        }

        let size = record.response_size();
        if self.min_size.is_some_and(|min| size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| size > max) {
            return false;
        }

        if self.only_errors && record.is_success() {
            return false;
        }
        if self.only_successful && !record.is_success() {
            return false;
        }

        if !self.hosts.is_empty() {
            let host = record.host().to_ascii_lowercase();
            if !self
                .hosts
                .iter()
                .any(|h| host.contains(&h.to_ascii_lowercase()))
            {
                return false;
            }
        }

        if let Some(range) = &self.time_range {
            if !range.contains(record.started_at, now) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestParts, ResponseParts};
    use std::time::Duration;

    fn sample(method: &str, url: &str, status: u16, elapsed_ms: u64) -> HttpRecord {
        let mut record = HttpRecord::new(1, RequestParts::new(method, url));
        record.set_response(
            ResponseParts::new(status).with_header("Content-Type", "application/json"),
        );
        record.append_body(b"{\"ok\":true}");
        record.complete(Duration::from_millis(elapsed_ms));
        record
    }

    #[test]
    fn default_filter_matches_everything() {
        let filter = RecordFilter::default();
        assert!(!filter.is_active());
        assert!(filter.matches(&sample("GET", "https://a.test/", 500, 10)));
    }

    #[test]
    fn method_and_status_ranges() {
        let filter = RecordFilter {
            methods: vec!["post".into()],
            status_ranges: vec![StatusRange::SUCCESS],
            ..RecordFilter::default()
        };
        assert!(filter.matches(&sample("POST", "https://a.test/", 201, 10)));
        assert!(!filter.matches(&sample("GET", "https://a.test/", 201, 10)));
        assert!(!filter.matches(&sample("POST", "https://a.test/", 404, 10)));
    }

    #[test]
    fn duration_bounds_require_completed_records() {
        let filter = RecordFilter {
            min_duration_ms: Some(100),
            max_duration_ms: Some(500),
            ..RecordFilter::default()
        };
        assert!(filter.matches(&sample("GET", "https://a.test/", 200, 250)));
        assert!(!filter.matches(&sample("GET", "https://a.test/", 200, 50)));

        let pending = HttpRecord::new(9, RequestParts::new("GET", "https://a.test/"));
        assert!(!filter.matches(&pending));
    }

    #[test]
    fn host_content_type_and_error_flags() {
        let mut failed = sample("GET", "https://api.example.com/v1", 200, 10);
        failed.set_error("offline".into(), "The Internet connection appears to be offline.".into());

        let filter = RecordFilter {
            hosts: vec!["EXAMPLE".into()],
            content_types: vec!["json".into()],
            only_errors: true,
            ..RecordFilter::default()
        };
        assert!(filter.matches(&failed));
        assert!(!filter.matches(&sample("GET", "https://api.example.com/v1", 200, 10)));
        assert!(!filter.matches(&sample("GET", "https://other.test/v1", 200, 10)));
    }

    #[test]
    fn time_range_windows_on_start_time() {
        let now = Utc::now();
        let mut recent = sample("GET", "https://a.test/", 200, 10);
        recent.started_at = now - chrono::Duration::minutes(30);
        let mut earlier = sample("GET", "https://a.test/", 200, 10);
        earlier.started_at = now - chrono::Duration::hours(5);
        let mut old = sample("GET", "https://a.test/", 200, 10);
        old.started_at = now - chrono::Duration::days(2);

        let last_hour = RecordFilter {
            time_range: Some(TimeRange::LastHour),
            ..RecordFilter::default()
        };
        assert!(last_hour.is_active());
        assert!(last_hour.matches_at(&recent, now));
        assert!(!last_hour.matches_at(&earlier, now));

        let last_day = RecordFilter {
            time_range: Some(TimeRange::LastDay),
            ..RecordFilter::default()
        };
        assert!(last_day.matches_at(&earlier, now));
        assert!(!last_day.matches_at(&old, now));

        let custom = RecordFilter {
            time_range: Some(TimeRange::Custom {
                start: now - chrono::Duration::days(3),
                end: now - chrono::Duration::days(1),
            }),
            ..RecordFilter::default()
        };
        assert!(custom.matches_at(&old, now));
        assert!(!custom.matches_at(&recent, now));
    }
}
