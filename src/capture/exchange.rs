//! Per-exchange capture state

use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;

use super::cache_policy::evaluate_cache_policy;
use super::interceptor::Interceptor;
use super::status_error::status_error;
use crate::models::{HttpRecord, RequestParts, ResponseParts};

/// Failure reported by the network stack for an exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    TimedOut,

    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Classify an error (and its source chain) coming out of an HTTP client.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut current = Some(err);
        while let Some(e) = current {
            if e.is::<tokio::time::error::Elapsed>() {
                return TransportError::TimedOut;
            }
            if let Some(io) = e.downcast_ref::<std::io::Error>() {
                if io.kind() == std::io::ErrorKind::TimedOut {
                    return TransportError::TimedOut;
                }
            }
            current = e.source();
        }
        TransportError::Network(err.to_string())
    }

    pub fn localized_description(&self) -> String {
        match self {
            TransportError::Network(detail) => {
                format!("The request could not be completed: {detail}.")
            }
            TransportError::TimedOut => "The request timed out.".to_string(),
            TransportError::Cancelled => "The request was cancelled.".to_string(),
        }
    }
}

/// One in-flight request/response exchange.
///
/// Created by [`Interceptor::begin`] for admitted requests. Every event method
/// takes `&self`, so an exchange can be shared between the task reading the body
/// and one that cancels it. The record leaves the exchange exactly once, through
/// `finish`, `fail`, `cancel`, or drop (which counts as cancellation).
pub struct Exchange {
    interceptor: Interceptor,
    request: RequestParts,
    record: Mutex<Option<HttpRecord>>,
    started: Instant,
}

impl Exchange {
    pub(crate) fn new(interceptor: Interceptor, record: HttpRecord) -> Self {
        let request = RequestParts {
            url: record.url.clone(),
            method: record.method.clone(),
            headers: record.request_headers.clone(),
            body: None,
        };
        Self {
            interceptor,
            request,
            record: Mutex::new(Some(record)),
            started: Instant::now(),
        }
    }

    /// Sequence number of the record being built.
    pub fn id(&self) -> Option<u64> {
        self.lock().as_ref().map(|r| r.id)
    }

    pub fn is_finished(&self) -> bool {
        self.lock().is_none()
    }

    /// Response head arrived: status, headers, cache policy and encryption marker.
    pub fn response_received(&self, response: ResponseParts) {
        let encrypted = self
            .interceptor
            .is_marked_encrypted(&self.request.url, &response.headers);
        let policy = evaluate_cache_policy(&self.request, &response);

        let mut guard = self.lock();
        let Some(record) = guard.as_mut() else {
            return;
        };
        tracing::debug!(
            id = record.id,
            status = response.status,
            ?policy,
            encrypted,
            "response received"
        );
        record.cache_policy = Some(policy);
        if encrypted {
            record.mark_encrypted();
        }
        record.set_response(response);
    }

    /// Append a body chunk. Ignored once the exchange is finalized.
    pub fn data_received(&self, chunk: &[u8]) {
        let mut guard = self.lock();
        if let Some(record) = guard.as_mut() {
            record.append_body(chunk);
        }
    }

    pub fn finish(&self) {
        self.finalize(None);
    }

    pub fn fail(&self, error: TransportError) {
        self.finalize(Some(error));
    }

    pub fn cancel(&self) {
        self.finalize(Some(TransportError::Cancelled));
    }

    fn finalize(&self, error: Option<TransportError>) {
        let Some(mut record) = self.lock().take() else {
            return;
        };
        record.complete(self.started.elapsed());
        if let Some(error) = error {
            tracing::debug!(id = record.id, %error, "exchange failed");
            record.set_error(error.to_string(), error.localized_description());
        } else if let Some((description, localized)) = record.status_code().and_then(status_error)
        {
            record.set_error(description.to_string(), localized.to_string());
        }
        self.interceptor.deliver(record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<HttpRecord>> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        self.finalize(Some(TransportError::Cancelled));
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("url", &self.request.url)
            .field("finished", &self.is_finished())
            .finish()
    }
}
