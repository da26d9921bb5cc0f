//! Captured record storage and export

mod har;
mod record_store;

pub use har::{export_har_to_path, records_to_har};
pub use record_store::{
    RecordStore, StoreEvent, DEFAULT_BODY_SUMMARY_LIMIT, DEFAULT_MAX_RECORDS,
};
