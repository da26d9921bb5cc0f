//! Public API for the host application and the inspector layer.

pub mod capture_api;
