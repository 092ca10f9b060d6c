use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable that relocates every ledgerline directory.
pub const HOME_ENV_VAR: &str = "LEDGERLINE_HOME";

const LEDGER_EXTENSION: &str = "json";

/// Engine-wide settings persisted as `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Currency forecasts and reports are expressed in.
    #[serde(default = "Config::default_base_currency")]
    pub base_currency: String,
    /// How many days back a missing FX quote may fall back to.
    #[serde(default = "Config::default_fx_tolerance_days")]
    pub fx_tolerance_days: i64,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,
    #[serde(default = "Config::default_upcoming_lookback_days")]
    pub upcoming_lookback_days: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened_ledger: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for ledgers. Defaults to `<data home>/ledgers`.
    pub default_ledger_root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for backups. Defaults to `<data home>/backups`.
    pub default_backup_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_currency: Self::default_base_currency(),
            fx_tolerance_days: Self::default_fx_tolerance_days(),
            backup_retention: Self::default_backup_retention(),
            upcoming_lookback_days: Self::default_upcoming_lookback_days(),
            last_opened_ledger: None,
            default_ledger_root: None,
            default_backup_root: None,
        }
    }
}

impl Config {
    pub fn default_base_currency() -> String {
        "USD".into()
    }

    pub fn default_fx_tolerance_days() -> i64 {
        5
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    pub fn default_upcoming_lookback_days() -> i64 {
        365
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let code = self.base_currency.trim();
        if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid(format!(
                "base currency `{}` is not an ISO 4217 code",
                self.base_currency
            )));
        }
        if self.fx_tolerance_days < 0 {
            return Err(ConfigError::Invalid(
                "fx_tolerance_days must not be negative".into(),
            ));
        }
        if self.upcoming_lookback_days < 0 {
            return Err(ConfigError::Invalid(
                "upcoming_lookback_days must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn resolve_default_ledger_root(&self) -> PathBuf {
        match &self.default_ledger_root {
            Some(path) => path.clone(),
            None => data_home().join("ledgers"),
        }
    }

    pub fn resolve_default_backup_root(&self) -> PathBuf {
        match &self.default_backup_root {
            Some(path) => path.clone(),
            None => data_home().join("backups"),
        }
    }

    /// File holding ledger `name` under the ledger root.
    pub fn ledger_path(&self, name: &str) -> PathBuf {
        ledger_file(&self.resolve_default_ledger_root(), name)
    }

    /// The ledger to open when the caller names none.
    pub fn active_ledger_name(&self) -> &str {
        self.last_opened_ledger.as_deref().unwrap_or("default")
    }
}

/// Root of every ledgerline directory: `$LEDGERLINE_HOME` when set, else the
/// platform data directory.
pub fn data_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|value| !value.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledgerline")
}

fn ledger_file(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{}.{}", name, LEDGER_EXTENSION))
}
