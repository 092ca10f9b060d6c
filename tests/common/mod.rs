#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use chrono::{DateTime, TimeZone, Utc};
use ledgerline::{ledgerline_config::Config, Engine};
use ledgerline_storage_json::{JsonLedgerStore, StoragePaths};
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates an isolated data home and a config pointing into it.
pub fn setup_test_env() -> (PathBuf, Config) {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);

    let config = Config {
        default_ledger_root: Some(base.join("ledgers")),
        default_backup_root: Some(base.join("backups")),
        ..Config::default()
    };
    (base, config)
}

pub fn open_engine(config: &Config) -> Engine<JsonLedgerStore> {
    Engine::open(config.clone()).expect("open engine")
}

/// Opens the default ledger of a data home the way the maintenance binary does.
pub fn open_default_store(home: &std::path::Path) -> JsonLedgerStore {
    JsonLedgerStore::open(StoragePaths {
        ledger_path: home.join("ledgers").join("default.json"),
        backup_root: home.join("backups"),
    })
    .expect("open store")
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
        .single()
        .expect("valid instant")
}
