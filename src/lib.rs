//! # netscope core

//! In-process HTTP traffic interception and recording engine for debugging
//! overlays.
//!
//! ## Features
//!
//! - Transparent capture of every request made through a wrapped HTTP client
//! - Allow/deny URL filtering
//! - Cache storage policy classification
//! - Optional decryption of marked response bodies
//! - Searchable, observable record store with HAR export
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                Inspector UI / export (host)              │
//! ├─────────────────────────────────────────────────────────┤
//! │                     api::capture_api                     │
//! ├─────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌─────────────┐  ┌───────────────┐   │
//! │  │ Capturing    │──│ Interceptor │──│  RecordStore  │   │
//! │  │ client       │  │  + filters  │  │  (in memory)  │   │
//! │  └──────────────┘  └─────────────┘  └───────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod capture;
pub mod models;
pub mod storage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
