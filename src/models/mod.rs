//! Data models for captured traffic
//!
//! These models are shared between the interceptor, the record store and export.

pub mod filter;
pub mod record;

pub use filter::*;
pub use record::*;
