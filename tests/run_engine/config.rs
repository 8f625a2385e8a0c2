//! File-based configuration.

use std::fs;
use std::sync::Arc;

use runkeeper::{
    Database, Error, QueueConsumer, RunkeeperConfig, CONFIG_FILE_NAME,
};
use tempfile::TempDir;

use crate::common::*;

#[test]
fn database_opens_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        "[queue]\nmax_deliveries = 2\n\n[worker]\nconsumers = 1\n",
    )
    .unwrap();

    let db = Database::from_config_file(&path).unwrap();
    assert_eq!(db.config().queue.max_deliveries, 2);
    assert_eq!(db.config().worker.consumers, 1);
    assert_eq!(db.config().queue.receive_timeout_ms, 100);

    let h = Harness::with_database(db);
    let run = h.queue_run();
    let pool = QueueConsumer::start(h.worker(Arc::new(ScriptedModelClient::replying("Hi"))))
        .unwrap();
    assert_eq!(pool.stats().consumers, 1);
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while h.db.pending() > 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    pool.shutdown();
    assert_eq!(h.run(&run.id).status, RunStatus::Completed);
}

#[test]
fn default_file_is_written_once_and_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    RunkeeperConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(
        RunkeeperConfig::from_file(&path).unwrap(),
        RunkeeperConfig::default()
    );

    fs::write(&path, "[worker]\nconsumers = 9\n").unwrap();
    RunkeeperConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(RunkeeperConfig::from_file(&path).unwrap().worker.consumers, 9);
}

#[test]
fn bad_config_files_are_rejected() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        Database::from_config_file(&missing).unwrap_err(),
        Error::Io(_)
    ));

    let invalid = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&invalid, "[worker]\nconsumers = 0\n").unwrap();
    assert!(matches!(
        Database::from_config_file(&invalid).unwrap_err(),
        Error::InvalidInput { .. }
    ));
}
