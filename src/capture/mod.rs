//! Traffic capture
//!
//! This module contains the interceptor that observes the host's HTTP traffic
//! and the pure classification steps it runs on every exchange.

pub mod cache_policy;
pub mod client;
pub mod decryption;
pub mod exchange;
pub mod interceptor;
pub mod status_error;
pub mod url_filter;

pub use cache_policy::evaluate_cache_policy;
pub use client::{CapturedBody, CapturingClient, HttpClient};
pub use decryption::{AesGcmDecryptor, DecryptionError, Decryptor, DecryptorRegistry};
pub use exchange::{Exchange, TransportError};
pub use interceptor::{Interceptor, NetworkConfig, NetworkStack, DEFAULT_ENCRYPTION_MARKER};
pub use status_error::status_error;
pub use url_filter::UrlFilter;
