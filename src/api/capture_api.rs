//! Capture API
//!
//! Process-wide entry points for the host application and the inspector layer.
//! One interceptor (and its record store) lives for the whole process; `clear`
//! is the only way records go away.

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::capture::{DecryptionError, Decryptor, Interceptor, NetworkConfig, NetworkStack};
use crate::models::{HttpRecord, RecordFilter};
use crate::storage::{self, StoreEvent};

static ENGINE: Lazy<Interceptor> = Lazy::new(|| Interceptor::new(&NetworkConfig::default()));

/// Get the version of the capture core library
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Initialize logging. With `log_dir` set, logs go to a daily rolling file in
/// that directory; otherwise to stderr. Safe to call more than once.
pub fn init_core(log_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let level = resolve_log_level();

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir).map_err(|e| {
                anyhow::anyhow!("Failed to create log directory {}: {}", dir.display(), e)
            })?;
            let file_appender = tracing_appender::rolling::daily(&dir, "netscope_core");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Logging lasts until process exit.
            std::mem::forget(guard);
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(non_blocking)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }

    tracing::info!("netscope core initialized v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

fn resolve_log_level() -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;

    match std::env::var("RUST_LOG") {
        Ok(val) => match val.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            "off" => LevelFilter::OFF,
            _ => LevelFilter::INFO,
        },
        Err(_) => LevelFilter::INFO,
    }
}

/// The process-wide interceptor
pub fn engine() -> &'static Interceptor {
    &ENGINE
}

pub fn configure(config: &NetworkConfig) {
    ENGINE.apply_config(config);
}

/// Install capture into the host's network stack. Repeated calls are no-ops.
pub fn activate(stack: &dyn NetworkStack) -> bool {
    ENGINE.activate(stack)
}

pub fn is_active() -> bool {
    ENGINE.is_active()
}

pub fn get_all_records() -> Vec<HttpRecord> {
    ENGINE.store().all()
}

pub fn find_record(id: u64) -> Option<HttpRecord> {
    ENGINE.store().find(id)
}

pub fn search_records(text: &str) -> Vec<HttpRecord> {
    ENGINE.store().search(text)
}

pub fn query_records(filter: &RecordFilter) -> Vec<HttpRecord> {
    ENGINE.store().query(filter)
}

pub fn clear_records() -> usize {
    ENGINE.store().clear()
}

pub fn subscribe_records() -> broadcast::Receiver<StoreEvent> {
    ENGINE.store().subscribe()
}

pub fn set_only_urls(urls: Vec<String>) {
    ENGINE.set_only_urls(urls);
}

pub fn set_ignored_urls(urls: Vec<String>) {
    ENGINE.set_ignored_urls(urls);
}

pub fn set_decryption_enabled(enabled: bool) {
    ENGINE.set_decryption_enabled(enabled);
}

pub fn set_encryption_service(service: Option<Arc<dyn Decryptor>>) {
    ENGINE.set_encryption_service(service);
}

pub fn register_decryptor(url_pattern: &str, decryptor: Arc<dyn Decryptor>) {
    ENGINE.register_decryptor(url_pattern, decryptor);
}

/// Register an AES-GCM key (16 or 32 bytes) for URLs containing `url_pattern`.
pub fn register_decryption_key(url_pattern: &str, key: &[u8]) -> Result<(), DecryptionError> {
    ENGINE.register_decryption_key(url_pattern, key)
}

/// Export every record currently stored as HAR.
pub fn export_har(output_path: impl AsRef<Path>) -> anyhow::Result<usize> {
    storage::export_har_to_path(&get_all_records(), output_path)
}
