//! Cache storage policy evaluation
//!
//! Mirrors platform HTTP caching rules: the status code seeds cacheability, then
//! `Cache-Control` on the response and the request can veto it.

use crate::models::{CachePolicy, RequestParts, ResponseParts};

const CACHEABLE_STATUSES: [u16; 7] = [200, 203, 206, 301, 304, 404, 410];

/// Decide whether (and where) a response may be cached.
///
/// The request veto needs both `no-store` and `no-cache`, while the response
/// veto needs only `no-store`.
pub fn evaluate_cache_policy(request: &RequestParts, response: &ResponseParts) -> CachePolicy {
    let mut cacheable = CACHEABLE_STATUSES.contains(&response.status);

    if cacheable {
        let response_cc = response
            .headers
            .get_or_empty("cache-control")
            .to_ascii_lowercase();
        if response_cc.contains("no-store") {
            cacheable = false;
        }
    }

    if cacheable {
        let request_cc = request
            .headers
            .get_or_empty("cache-control")
            .to_ascii_lowercase();
        if request_cc.contains("no-store") && request_cc.contains("no-cache") {
            cacheable = false;
        }
    }

    if !cacheable {
        CachePolicy::NotAllowed
    } else if request.scheme() == "https" {
        CachePolicy::AllowedInMemoryOnly
    } else {
        CachePolicy::Allowed
    }
}
