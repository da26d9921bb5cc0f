//! HTTP Record model
//!
//! Represents a single request/response exchange observed by the interceptor.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header mapping with case-insensitive keys.
///
/// Inserting a key that already exists (ignoring ASCII case) replaces its value,
/// so the last write wins. The casing of the first insertion is kept for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderFields {
    entries: Vec<(String, String)>,
}

impl HeaderFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an `http::HeaderMap`; non UTF-8 values are converted lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut fields = Self::new();
        for (name, value) in map {
            fields.insert(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        fields
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Header value or the empty string when absent.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `name: value` line per header.
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fields = Self::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Outcome of the cache storage policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    NotAllowed,
    AllowedInMemoryOnly,
    Allowed,
}

/// Request facet as reported by the network stack when an exchange starts.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub url: String,
    pub method: String,
    pub headers: HeaderFields,
    pub body: Option<Vec<u8>>,
}

impl RequestParts {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// URL scheme, lowercased; empty when the URL has none.
    pub fn scheme(&self) -> String {
        scheme_of(&self.url)
    }
}

/// Response head as reported by the network stack.
#[derive(Debug, Clone, Default)]
pub struct ResponseParts {
    pub status: u16,
    pub headers: HeaderFields,
}

impl ResponseParts {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderFields::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// MIME type from `Content-Type`, without parameters.
    pub fn mime_type(&self) -> Option<String> {
        self.headers
            .get("content-type")
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }
}

/// Machine and human readable error descriptions; always set together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFacet {
    pub description: String,
    pub localized_description: String,
}

/// Represents one captured request/response exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRecord {
    /// Process-unique, monotonically increasing sequence number
    pub id: u64,
    pub url: String,
    pub method: String,

    // Request data
    pub request_headers: HeaderFields,
    pub request_body: Option<Vec<u8>>,
    pub started_at: DateTime<Utc>,

    // Response data
    status_code: Option<u16>,
    response_headers: Option<HeaderFields>,
    pub response_body: Option<Vec<u8>>,
    decrypted_response_body: Option<Vec<u8>>,
    pub mime_type: Option<String>,
    ended_at: Option<DateTime<Utc>>,
    duration_ms: Option<u64>,

    // Classification
    is_encrypted: bool,
    pub cache_policy: Option<CachePolicy>,
    error: Option<ErrorFacet>,
}

impl HttpRecord {
    pub fn new(id: u64, request: RequestParts) -> Self {
        Self {
            id,
            url: request.url,
            method: request.method,
            request_headers: request.headers,
            request_body: request.body,
            started_at: Utc::now(),
            status_code: None,
            response_headers: None,
            response_body: None,
            decrypted_response_body: None,
            mime_type: None,
            ended_at: None,
            duration_ms: None,
            is_encrypted: false,
            cache_policy: None,
            error: None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn response_headers(&self) -> Option<&HeaderFields> {
        self.response_headers.as_ref()
    }

    /// Status and headers are only ever set as a pair.
    pub fn set_response(&mut self, response: ResponseParts) {
        self.mime_type = response.mime_type();
        self.status_code = Some(response.status);
        self.response_headers = Some(response.headers);
    }

    pub fn append_body(&mut self, chunk: &[u8]) {
        self.response_body
            .get_or_insert_with(Vec::new)
            .extend_from_slice(chunk);
    }

    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    pub(crate) fn mark_encrypted(&mut self) {
        self.is_encrypted = true;
    }

    pub fn decrypted_response_body(&self) -> Option<&[u8]> {
        self.decrypted_response_body.as_deref()
    }

    /// Stores decrypted bytes. Ignored unless the record is marked encrypted.
    pub fn set_decrypted_body(&mut self, body: Vec<u8>) -> bool {
        if !self.is_encrypted {
            return false;
        }
        self.decrypted_response_body = Some(body);
        true
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Stamp the end of the exchange. `elapsed` comes from a monotonic clock, so
    /// `ended_at` can never precede `started_at`.
    pub fn complete(&mut self, elapsed: std::time::Duration) {
        let elapsed_chrono =
            chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        self.ended_at = Some(self.started_at + elapsed_chrono);
        self.duration_ms = Some(elapsed.as_millis() as u64);
    }

    pub fn error(&self) -> Option<&ErrorFacet> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, description: String, localized_description: String) {
        self.error = Some(ErrorFacet {
            description,
            localized_description,
        });
    }

    pub fn is_success(&self) -> bool {
        self.error
            .as_ref()
            .map(|e| e.description.is_empty())
            .unwrap_or(true)
    }

    pub fn scheme(&self) -> String {
        scheme_of(&self.url)
    }

    /// Host portion of the URL (without port); empty when it cannot be parsed.
    pub fn host(&self) -> String {
        self.url
            .parse::<http::Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn response_size(&self) -> u64 {
        self.response_body.as_ref().map(|b| b.len() as u64).unwrap_or(0)
    }

    /// Decrypted body if available, otherwise the raw body.
    pub fn display_body(&self) -> Option<&[u8]> {
        self.decrypted_response_body
            .as_deref()
            .or(self.response_body.as_deref())
    }

    pub fn is_image(&self) -> bool {
        if let Some(mime) = &self.mime_type {
            if mime.contains("image") {
                return true;
            }
        }
        let path = self.url.split(['?', '#']).next().unwrap_or("");
        let lower = path.to_ascii_lowercase();
        [".png", ".jpg", ".jpeg", ".gif"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    }

    pub fn duration_str(&self) -> String {
        match self.duration_ms {
            Some(ms) if ms < 1000 => format!("{}ms", ms),
            Some(ms) => format!("{:.1}s", ms as f64 / 1000.0),
            None => "-".to_string(),
        }
    }

    pub fn size_str(&self) -> String {
        match self.response_body.as_ref().map(|b| b.len() as u64) {
            Some(size) if size < 1024 => format!("{}B", size),
            Some(size) if size < 1024 * 1024 => format!("{:.1}KB", size as f64 / 1024.0),
            Some(size) => format!("{:.1}MB", size as f64 / (1024.0 * 1024.0)),
            None => "-".to_string(),
        }
    }
}

fn scheme_of(url: &str) -> String {
    url.find("://")
        .map(|pos| url[..pos].to_ascii_lowercase())
        .unwrap_or_default()
}
