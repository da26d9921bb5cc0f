use crate::models::{HttpRecord, RecordFilter};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Suggested cap for hosts that opt into eviction
pub const DEFAULT_MAX_RECORDS: usize = 1000;
/// Bytes of body text considered by `search`
pub const DEFAULT_BODY_SUMMARY_LIMIT: usize = 64 * 1024;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Change notification emitted after every mutation, in mutation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Inserted { id: u64, evicted: Option<u64> },
    Cleared { removed: usize },
}

/// Thread-safe, ordered collection of finished records.
///
/// Records are appended in completion order. Every mutation and its
/// notification happen under the same write lock, so subscribers observe events
/// in exactly the order the store changed.
pub struct RecordStore {
    records: RwLock<VecDeque<HttpRecord>>,
    /// Stored as 0 when unbounded
    max_records: AtomicUsize,
    body_summary_limit: AtomicUsize,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RecordStore {
    /// `max_records` is an opt-in cap. `None` keeps every record until `clear`;
    /// a cap of zero cannot hold anything and is treated as `None`.
    pub fn new(max_records: Option<usize>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            records: RwLock::new(VecDeque::new()),
            max_records: AtomicUsize::new(cap_value(max_records)),
            body_summary_limit: AtomicUsize::new(DEFAULT_BODY_SUMMARY_LIMIT),
            events,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn set_max_records(&self, max_records: Option<usize>) {
        self.max_records
            .store(cap_value(max_records), Ordering::SeqCst);
    }

    pub fn set_body_summary_limit(&self, limit: usize) {
        self.body_summary_limit.store(limit, Ordering::SeqCst);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Append a finished record. Returns false if a record with the same id is
    /// already stored.
    pub fn insert(&self, record: HttpRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.iter().any(|r| r.id == record.id) {
            tracing::warn!(id = record.id, "duplicate record submission ignored");
            return false;
        }

        let id = record.id;
        records.push_back(record);

        let max = self.max_records.load(Ordering::SeqCst);
        let mut evicted = None;
        while max > 0 && records.len() > max {
            evicted = records.pop_front().map(|r| r.id);
        }

        let _ = self.events.send(StoreEvent::Inserted { id, evicted });
        true
    }

    pub fn find(&self, id: u64) -> Option<HttpRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<HttpRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let removed = records.len();
        records.clear();
        let _ = self.events.send(StoreEvent::Cleared { removed });
        tracing::info!(removed, "record store cleared");
        removed
    }

    /// Case-insensitive substring search over URL, method, status, headers and
    /// body text. An empty query returns every record.
    pub fn search(&self, text: &str) -> Vec<HttpRecord> {
        let needle = text.to_lowercase();
        let limit = self.body_summary_limit.load(Ordering::SeqCst);
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        if needle.is_empty() {
            return records.iter().cloned().collect();
        }
        records
            .iter()
            .filter(|r| search_text(r, limit).contains(&needle))
            .cloned()
            .collect()
    }

    pub fn query(&self, filter: &RecordFilter) -> Vec<HttpRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }
}

fn cap_value(max_records: Option<usize>) -> usize {
    if max_records == Some(0) {
        tracing::warn!("max_records of 0 ignored; record store is unbounded");
    }
    max_records.unwrap_or(0)
}

/// Lowercased text a record is searched against.
fn search_text(record: &HttpRecord, body_limit: usize) -> String {
    let mut text = String::new();
    text.push_str(&record.url);
    text.push('\n');
    text.push_str(&record.method);
    if let Some(status) = record.status_code() {
        text.push('\n');
        text.push_str(&status.to_string());
    }
    text.push('\n');
    text.push_str(&record.request_headers.summary());
    if let Some(headers) = record.response_headers() {
        text.push('\n');
        text.push_str(&headers.summary());
    }
    if let Some(body) = record.request_body.as_deref() {
        text.push('\n');
        text.push_str(&body_summary(body, body_limit));
    }
    if let Some(body) = record.display_body() {
        text.push('\n');
        text.push_str(&body_summary(body, body_limit));
    }
    text.to_lowercase()
}

fn body_summary(body: &[u8], limit: usize) -> String {
    let end = body.len().min(limit);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestParts, ResponseParts, StatusRange};
    use std::sync::Arc;

    fn record(id: u64, url: &str) -> HttpRecord {
        HttpRecord::new(id, RequestParts::new("GET", url))
    }

    #[test]
    fn insert_preserves_arrival_order_and_rejects_duplicates() {
        let store = RecordStore::unbounded();
        assert!(store.insert(record(5, "https://slow.test/")));
        assert!(store.insert(record(2, "https://fast.test/")));
        assert!(!store.insert(record(5, "https://slow.test/")));

        let ids: Vec<u64> = store.all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 2]);
        assert_eq!(store.find(2).unwrap().url, "https://fast.test/");
        assert!(store.find(99).is_none());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let store = RecordStore::new(Some(2));
        let mut rx = store.subscribe();
        for id in 1..=3 {
            store.insert(record(id, "https://a.test/"));
        }
        let ids: Vec<u64> = store.all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Inserted { id: 1, evicted: None });
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Inserted { id: 2, evicted: None });
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::Inserted { id: 3, evicted: Some(1) }
        );
    }

    #[test]
    fn default_store_is_unbounded_and_zero_cap_is_ignored() {
        for store in [RecordStore::default(), RecordStore::new(Some(0))] {
            for id in 1..=(DEFAULT_MAX_RECORDS as u64 + 1) {
                store.insert(record(id, "https://a.test/"));
            }
            assert_eq!(store.len(), DEFAULT_MAX_RECORDS + 1);
            assert!(store.find(1).is_some());
        }
    }

    #[test]
    fn search_is_case_insensitive_and_restartable() {
        let store = RecordStore::unbounded();
        store.insert(record(1, "https://Example.com/api"));
        store.insert(record(2, "https://other.test/"));

        let lower = store.search("example");
        let upper = store.search("EXAMPLE");
        assert_eq!(lower.len(), 1);
        assert_eq!(upper.len(), 1);
        assert_eq!(lower[0].id, 1);
        assert!(store.search("zzz").is_empty());
        assert_eq!(store.search("").len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn search_covers_headers_and_body() {
        let store = RecordStore::unbounded();
        let mut r = record(1, "https://a.test/");
        r.set_response(ResponseParts::new(201).with_header("X-Request-Id", "Abc-123"));
        r.append_body(b"{\"user\":\"Grace\"}");
        store.insert(r);

        assert_eq!(store.search("abc-123").len(), 1);
        assert_eq!(store.search("grace").len(), 1);
        assert_eq!(store.search("201").len(), 1);
    }

    #[test]
    fn search_body_respects_summary_limit() {
        let store = RecordStore::unbounded();
        store.set_body_summary_limit(4);
        let mut r = record(1, "https://a.test/");
        r.set_response(ResponseParts::new(200));
        r.append_body(b"headTAIL");
        store.insert(r);
        assert_eq!(store.search("head").len(), 1);
        assert!(store.search("tail").is_empty());
    }

    #[test]
    fn clear_then_search_is_empty_and_notifies() {
        let store = RecordStore::unbounded();
        let mut rx = store.subscribe();
        store.insert(record(1, "https://a.test/"));
        assert_eq!(store.clear(), 1);
        assert!(store.search("a.test").is_empty());
        assert!(store.search("").is_empty());

        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::Inserted { id: 1, .. }));
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Cleared { removed: 1 });
    }

    #[test]
    fn query_applies_record_filter() {
        let store = RecordStore::unbounded();
        let mut ok = record(1, "https://a.test/");
        ok.set_response(ResponseParts::new(200));
        let mut missing = record(2, "https://a.test/missing");
        missing.set_response(ResponseParts::new(404));
        store.insert(ok);
        store.insert(missing);

        let filter = RecordFilter {
            status_ranges: vec![StatusRange::CLIENT_ERROR],
            ..RecordFilter::default()
        };
        let found = store.query(&filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
    }

    #[test]
    fn concurrent_inserts_and_clear_never_tear() {
        let store = Arc::new(RecordStore::unbounded());
        let mut rx = store.subscribe();
        std::thread::scope(|scope| {
            for t in 0..4u64 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for i in 0..50u64 {
                        store.insert(record(t * 1000 + i, "https://a.test/"));
                    }
                });
            }
            let store = Arc::clone(&store);
            scope.spawn(move || {
                store.clear();
            });
        });

        // Replaying the events must reproduce the final length exactly.
        let mut expected = 0usize;
        while let Ok(event) = rx.try_recv() {
            match event {
                StoreEvent::Inserted { .. } => expected += 1,
                StoreEvent::Cleared { removed } => {
                    assert_eq!(removed, expected);
                    expected = 0;
                }
            }
        }
        assert_eq!(store.len(), expected);
    }
}
