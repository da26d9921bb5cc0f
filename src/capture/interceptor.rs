//! Capture engine
//!
//! The interceptor is installed into a [`NetworkStack`] once and from then on
//! turns every request the stack issues into an [`HttpRecord`]:
//!
//! ```text
//! begin ──► URL filter ──► Exchange ──► response / data / finish|fail|cancel
//!                                            │
//!                         cache policy ◄─────┤
//!                         decryption  ◄──────┴──► RecordStore::insert
//! ```

use dashmap::DashSet;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::decryption::{DecryptionError, Decryptor, DecryptorRegistry};
use super::exchange::Exchange;
use super::url_filter::UrlFilter;
use crate::models::{HeaderFields, HttpRecord, RequestParts};
use crate::storage::{RecordStore, DEFAULT_BODY_SUMMARY_LIMIT};

/// Sequence numbers are unique for the whole process, across interceptors.
static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

pub const DEFAULT_ENCRYPTION_MARKER: &str = "x-encrypted";

/// Recognized capture options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Allow-list; when non-empty only matching URLs are captured
    pub only_urls: Vec<String>,
    /// Deny-list; consulted only when the allow-list is empty
    pub ignored_urls: Vec<String>,
    pub decryption_enabled: bool,
    /// Response header whose presence marks the body as encrypted
    pub encryption_marker_header: String,
    /// Opt-in cap; past it the oldest records are evicted. `None` (the default)
    /// keeps everything until `clear`.
    pub max_records: Option<usize>,
    /// Body bytes considered by search
    pub body_summary_limit: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            only_urls: Vec::new(),
            ignored_urls: Vec::new(),
            decryption_enabled: false,
            encryption_marker_header: DEFAULT_ENCRYPTION_MARKER.to_string(),
            max_records: None,
            body_summary_limit: DEFAULT_BODY_SUMMARY_LIMIT,
        }
    }
}

/// Something the interceptor can be installed into.
///
/// Implementors keep the hook and call [`Interceptor::begin`] for each request
/// they issue.
pub trait NetworkStack: Send + Sync {
    fn install(&self, hook: Interceptor);
}

struct InterceptorInner {
    filter: RwLock<Arc<UrlFilter>>,
    decryption_enabled: AtomicBool,
    marker_header: RwLock<String>,
    decryptors: DecryptorRegistry,
    store: Arc<RecordStore>,
    /// Address of the stack the hook went into
    activated: OnceCell<usize>,
    in_flight: DashSet<u64>,
}

/// Cheaply cloneable handle to the capture engine
#[derive(Clone)]
pub struct Interceptor {
    inner: Arc<InterceptorInner>,
}

impl Interceptor {
    pub fn new(config: &NetworkConfig) -> Self {
        let store = Arc::new(RecordStore::new(config.max_records));
        store.set_body_summary_limit(config.body_summary_limit);
        Self::with_store(store, config)
    }

    pub fn with_store(store: Arc<RecordStore>, config: &NetworkConfig) -> Self {
        let inner = InterceptorInner {
            filter: RwLock::new(Arc::new(UrlFilter::new(
                config.only_urls.clone(),
                config.ignored_urls.clone(),
            ))),
            decryption_enabled: AtomicBool::new(config.decryption_enabled),
            marker_header: RwLock::new(config.encryption_marker_header.clone()),
            decryptors: DecryptorRegistry::new(),
            store,
            activated: OnceCell::new(),
            in_flight: DashSet::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Install the capture hook into `stack`. Only the first call (across all
    /// threads) installs; later calls are no-ops. Returns whether this call
    /// performed the installation.
    pub fn activate(&self, stack: &dyn NetworkStack) -> bool {
        let address = stack_address(stack);
        let mut installed = false;
        let active = *self.inner.activated.get_or_init(|| {
            stack.install(self.clone());
            installed = true;
            address
        });
        if installed {
            tracing::info!("network capture activated");
        } else if active != address {
            tracing::warn!(
                "network capture already active on another stack; this stack is not captured"
            );
        } else {
            tracing::debug!("network capture already active");
        }
        installed
    }

    pub fn is_active(&self) -> bool {
        self.inner.activated.get().is_some()
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.inner.store
    }

    /// Apply filter, decryption and store settings. The store itself is kept.
    pub fn apply_config(&self, config: &NetworkConfig) {
        self.set_filter(UrlFilter::new(
            config.only_urls.clone(),
            config.ignored_urls.clone(),
        ));
        self.set_decryption_enabled(config.decryption_enabled);
        {
            let mut marker = self
                .inner
                .marker_header
                .write()
                .unwrap_or_else(|e| e.into_inner());
            *marker = config.encryption_marker_header.clone();
        }
        self.inner.store.set_max_records(config.max_records);
        self.inner
            .store
            .set_body_summary_limit(config.body_summary_limit);
    }

    pub fn filter(&self) -> Arc<UrlFilter> {
        self.inner
            .filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the whole filter at once; readers see either the old or the new set.
    pub fn set_filter(&self, filter: UrlFilter) {
        let mut guard = self.inner.filter.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(filter);
    }

    pub fn set_only_urls(&self, only_urls: Vec<String>) {
        let mut guard = self.inner.filter.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(guard.with_only_urls(only_urls));
    }

    pub fn set_ignored_urls(&self, ignored_urls: Vec<String>) {
        let mut guard = self.inner.filter.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(guard.with_ignored_urls(ignored_urls));
    }

    pub fn set_decryption_enabled(&self, enabled: bool) {
        self.inner
            .decryption_enabled
            .store(enabled, Ordering::SeqCst);
    }

    pub fn decryption_enabled(&self) -> bool {
        self.inner.decryption_enabled.load(Ordering::SeqCst)
    }

    pub fn set_encryption_service(&self, decryptor: Option<Arc<dyn Decryptor>>) {
        self.inner.decryptors.set_default(decryptor);
    }

    pub fn register_decryptor(&self, url_pattern: &str, decryptor: Arc<dyn Decryptor>) {
        self.inner.decryptors.register(url_pattern, decryptor);
    }

    pub fn register_decryption_key(
        &self,
        url_pattern: &str,
        key: &[u8],
    ) -> Result<(), DecryptionError> {
        self.inner.decryptors.register_key(url_pattern, key)
    }

    /// Number of admitted exchanges that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Start capturing a request. Returns `None` when the URL filter rejects it;
    /// nothing is recorded for that exchange.
    pub fn begin(&self, request: RequestParts) -> Option<Exchange> {
        if !self.filter().admit(&request.url) {
            tracing::trace!(url = %request.url, "request filtered out");
            return None;
        }
        let id = NEXT_RECORD_ID.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(id, method = %request.method, url = %request.url, "exchange started");
        self.inner.in_flight.insert(id);
        Some(Exchange::new(self.clone(), HttpRecord::new(id, request)))
    }

    pub(crate) fn is_marked_encrypted(&self, url: &str, headers: &HeaderFields) -> bool {
        if !self.decryption_enabled() {
            return false;
        }
        let marked = {
            let marker = self
                .inner
                .marker_header
                .read()
                .unwrap_or_else(|e| e.into_inner());
            headers
                .get(&marker)
                .map(|v| {
                    let v = v.trim();
                    !(v == "0" || v.eq_ignore_ascii_case("false"))
                })
                .unwrap_or(false)
        };
        marked && self.inner.decryptors.resolve(url).is_some()
    }

    /// Hand a finalized record to the store. Encrypted bodies are decrypted on
    /// the blocking pool when a tokio runtime is available so a slow decryptor
    /// never holds up other exchanges.
    pub(crate) fn deliver(&self, record: HttpRecord) {
        self.inner.in_flight.remove(&record.id);

        let needs_decryption = record.is_encrypted() && record.response_body.is_some();
        if !needs_decryption {
            self.store_record(record);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn_blocking(move || {
                    let mut record = record;
                    this.decrypt_record(&mut record);
                    this.store_record(record);
                });
            }
            Err(_) => {
                let mut record = record;
                self.decrypt_record(&mut record);
                self.store_record(record);
            }
        }
    }

    fn decrypt_record(&self, record: &mut HttpRecord) {
        let Some(body) = record.response_body.as_deref() else {
            return;
        };
        // A panicking decryptor must not lose the record or unwind into the host.
        let decrypted = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner.decryptors.decrypt(&record.url, body)
        }))
        .unwrap_or_else(|_| Err(DecryptionError::Panicked));
        match decrypted {
            Ok(plain) => {
                record.set_decrypted_body(plain);
            }
            Err(err) => {
                tracing::warn!(
                    id = record.id,
                    url = %record.url,
                    %err,
                    "response decryption failed"
                );
            }
        }
    }

    fn store_record(&self, record: HttpRecord) {
        let id = record.id;
        let success = record.is_success();
        if self.inner.store.insert(record) {
            tracing::debug!(id, success, "record stored");
        }
    }
}

fn stack_address(stack: &dyn NetworkStack) -> usize {
    stack as *const _ as *const () as usize
}
