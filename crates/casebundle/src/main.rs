use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::info;

use casebundle::config::{load_config, load_config_from_str, Config};
use casebundle::db::{Database, SqliteRecordStore};
use casebundle::error::ConfigError;
use casebundle::storage::FilesystemBlobStore;
use casebundle::worker::BundleWorker;
use casebundle::{telemetry, CaseBundleError};

/// Environment variable naming the config file when no argument is given.
const CONFIG_ENV: &str = "CASEBUNDLE_CONFIG";

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

fn load() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) => load_config(path),
        None => load_config_from_str(r#"{ "version": "1.0" }"#),
    }
}

#[tokio::main]
async fn main() -> Result<(), CaseBundleError> {
    let config = load()?;
    telemetry::init(&config.logging)?;

    let db_path = config
        .resolved_database_path()
        .ok_or_else(|| ConfigError::Validation {
            message: "database_path is unset and no home directory was found".to_string(),
        })?;
    info!(
        "Opening database {}",
        casebundle::sanitize::redact_path(&db_path)
    );
    let db = Database::open(&db_path)?;
    let records = Arc::new(SqliteRecordStore::new(db));
    let blobs = Arc::new(FilesystemBlobStore::new(config.storage.root.clone()));

    let worker = BundleWorker::new(
        records,
        blobs,
        config.runner_settings(),
        config.worker.settings(),
    );

    let shutdown = worker.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, finishing current batch");
        shutdown.store(true, Ordering::Relaxed);
    })?;

    worker.run().await;
    Ok(())
}
