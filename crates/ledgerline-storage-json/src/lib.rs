//! ledgerline-storage-json
//!
//! File-backed [`LedgerStore`]: the whole ledger lives in memory and is
//! written as one JSON snapshot after every committed storage transaction.

use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use ledgerline_core::{CoreError, CoreResult, InMemoryStore, LedgerSnapshot, LedgerStore};
use ledgerline_domain::{
    Account, AccountId, Budget, BudgetId, Category, CategoryId, PlannedTransaction,
    PlannedTransactionId, Transaction, TransactionId, UserId,
};
use tracing::{debug, info};

const LEDGER_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// Where a ledger file and its backups live.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub ledger_path: PathBuf,
    pub backup_root: PathBuf,
}

/// A persisted copy of an earlier ledger state.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// JSON snapshot persistence on top of [`InMemoryStore`].
///
/// Writes made inside [`LedgerStore::atomically`] reach the file once the
/// outermost call commits; writes made outside one are flushed immediately.
#[derive(Debug)]
pub struct JsonLedgerStore {
    paths: StoragePaths,
    retention: usize,
    inner: InMemoryStore,
    depth: usize,
}

impl JsonLedgerStore {
    /// Opens `paths.ledger_path`, starting an empty ledger when the file does not exist yet.
    pub fn open(paths: StoragePaths) -> CoreResult<Self> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> CoreResult<Self> {
        fs::create_dir_all(&paths.backup_root)?;
        let inner = if paths.ledger_path.exists() {
            InMemoryStore::from_snapshot(load_snapshot(&paths.ledger_path)?)?
        } else {
            InMemoryStore::new()
        };
        info!(path = %paths.ledger_path.display(), "ledger opened");
        Ok(Self {
            paths,
            retention: retention.max(1),
            inner,
            depth: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.paths.ledger_path
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.snapshot()
    }

    /// Writes the current state, keeping the previous file as a backup.
    pub fn flush(&self) -> CoreResult<()> {
        let path = &self.paths.ledger_path;
        if path.exists() {
            let backup = self.backup_file_path(None);
            fs::copy(path, &backup)?;
            self.prune_backups()?;
        }
        save_snapshot(&self.inner.snapshot(), path)?;
        debug!(path = %path.display(), "ledger flushed");
        Ok(())
    }

    /// Writes the current state as a named backup.
    pub fn backup(&self, note: Option<&str>) -> CoreResult<BackupInfo> {
        let path = self.backup_file_path(note);
        save_snapshot(&self.inner.snapshot(), &path)?;
        self.prune_backups()?;
        let id = file_name(&path)?;
        Ok(BackupInfo {
            created_at: self.backup_timestamp(&id),
            id,
            path,
        })
    }

    /// Backups of this ledger, newest first.
    pub fn list_backups(&self) -> CoreResult<Vec<BackupInfo>> {
        let dir = &self.paths.backup_root;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}_", self.stem());
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LEDGER_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !name.starts_with(&prefix) {
                continue;
            }
            // Ledgers share the backup root; `main_x_<ts>.json` is not a backup of `main`.
            let Some(created_at) = self.backup_timestamp(name) else {
                continue;
            };
            entries.push(BackupInfo {
                id: name.to_string(),
                created_at: Some(created_at),
                path: path.clone(),
            });
        }
        entries.sort_by_key(|info| Reverse((info.created_at, info.id.clone())));
        Ok(entries)
    }

    /// Replaces the in-memory and on-disk ledger with a backup.
    pub fn restore_backup(&mut self, backup: &BackupInfo) -> CoreResult<()> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        self.inner = InMemoryStore::from_snapshot(load_snapshot(&backup.path)?)?;
        save_snapshot(&self.inner.snapshot(), &self.paths.ledger_path)?;
        info!(backup = %backup.id, "ledger restored from backup");
        Ok(())
    }

    fn stem(&self) -> String {
        self.paths
            .ledger_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("ledger")
            .to_string()
    }

    fn backup_file_path(&self, note: Option<&str>) -> PathBuf {
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut name = format!("{}_{}", self.stem(), timestamp);
        if let Some(label) = sanitize_backup_note(note) {
            name.push('_');
            name.push_str(&label);
        }
        self.paths
            .backup_root
            .join(format!("{}.{}", name, LEDGER_EXTENSION))
    }

    fn backup_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let rest = name.strip_prefix(&format!("{}_", self.stem()))?;
        let raw = rest.get(..15)?;
        if !matches!(rest.get(15..16), Some("." | "_")) {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, BACKUP_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    }

    fn prune_backups(&self) -> CoreResult<()> {
        for stale in self.list_backups()?.into_iter().skip(self.retention) {
            fs::remove_file(&stale.path)?;
        }
        Ok(())
    }

    fn after_write(&self) -> CoreResult<()> {
        if self.depth == 0 {
            self.flush()?;
        }
        Ok(())
    }
}

impl LedgerStore for JsonLedgerStore {
    fn insert_account(&mut self, account: Account) -> CoreResult<Account> {
        let stored = self.inner.insert_account(account)?;
        self.after_write()?;
        Ok(stored)
    }

    fn account(&self, id: AccountId) -> CoreResult<Option<Account>> {
        self.inner.account(id)
    }

    fn save_account(&mut self, account: &Account) -> CoreResult<()> {
        self.inner.save_account(account)?;
        self.after_write()
    }

    fn accounts_for_user(&self, user: UserId) -> CoreResult<Vec<Account>> {
        self.inner.accounts_for_user(user)
    }

    fn all_accounts(&self) -> CoreResult<Vec<Account>> {
        self.inner.all_accounts()
    }

    fn insert_category(&mut self, category: Category) -> CoreResult<Category> {
        let stored = self.inner.insert_category(category)?;
        self.after_write()?;
        Ok(stored)
    }

    fn category(&self, id: CategoryId) -> CoreResult<Option<Category>> {
        self.inner.category(id)
    }

    fn save_category(&mut self, category: &Category) -> CoreResult<()> {
        self.inner.save_category(category)?;
        self.after_write()
    }

    fn categories_for_user(&self, user: UserId) -> CoreResult<Vec<Category>> {
        self.inner.categories_for_user(user)
    }

    fn insert_transaction(&mut self, transaction: Transaction) -> CoreResult<Transaction> {
        let stored = self.inner.insert_transaction(transaction)?;
        self.after_write()?;
        Ok(stored)
    }

    fn transaction(&self, id: TransactionId) -> CoreResult<Option<Transaction>> {
        self.inner.transaction(id)
    }

    fn save_transaction(&mut self, transaction: &Transaction) -> CoreResult<()> {
        self.inner.save_transaction(transaction)?;
        self.after_write()
    }

    fn live_transactions_for_account(&self, account: AccountId) -> CoreResult<Vec<Transaction>> {
        self.inner.live_transactions_for_account(account)
    }

    fn live_transactions_between(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Transaction>> {
        self.inner.live_transactions_between(user, from, to)
    }

    fn all_transactions(&self) -> CoreResult<Vec<Transaction>> {
        self.inner.all_transactions()
    }

    fn insert_budget(&mut self, budget: Budget) -> CoreResult<Budget> {
        let stored = self.inner.insert_budget(budget)?;
        self.after_write()?;
        Ok(stored)
    }

    fn budget(&self, id: BudgetId) -> CoreResult<Option<Budget>> {
        self.inner.budget(id)
    }

    fn save_budget(&mut self, budget: &Budget) -> CoreResult<()> {
        self.inner.save_budget(budget)?;
        self.after_write()
    }

    fn budgets_for_user(&self, user: UserId) -> CoreResult<Vec<Budget>> {
        self.inner.budgets_for_user(user)
    }

    fn all_budgets(&self) -> CoreResult<Vec<Budget>> {
        self.inner.all_budgets()
    }

    fn insert_planned(&mut self, planned: PlannedTransaction) -> CoreResult<PlannedTransaction> {
        let stored = self.inner.insert_planned(planned)?;
        self.after_write()?;
        Ok(stored)
    }

    fn planned(&self, id: PlannedTransactionId) -> CoreResult<Option<PlannedTransaction>> {
        self.inner.planned(id)
    }

    fn save_planned(&mut self, planned: &PlannedTransaction) -> CoreResult<()> {
        self.inner.save_planned(planned)?;
        self.after_write()
    }

    fn planned_for_user(&self, user: UserId) -> CoreResult<Vec<PlannedTransaction>> {
        self.inner.planned_for_user(user)
    }

    fn atomically<T, F>(&mut self, op: F) -> CoreResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> CoreResult<T>,
    {
        let saved = self.inner.clone();
        self.depth += 1;
        let result = op(self);
        self.depth -= 1;
        let committed = match result {
            Ok(value) if self.depth == 0 => self.flush().map(|_| value),
            other => other,
        };
        if committed.is_err() {
            self.inner = saved;
        }
        committed
    }
}

/// Loads a ledger snapshot from the provided filesystem path.
pub fn load_snapshot(path: &Path) -> CoreResult<LedgerSnapshot> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))
}

/// Saves a snapshot to an arbitrary path through a temporary file.
pub fn save_snapshot(snapshot: &LedgerSnapshot, path: &Path) -> CoreResult<()> {
    let json =
        serde_json::to_string_pretty(snapshot).map_err(|err| CoreError::Serde(err.to_string()))?;
    let tmp = tmp_path(path);
    write_file(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn file_name(path: &Path) -> CoreResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Storage(format!("invalid backup path {}", path.display())))
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
        } else if !sanitized.is_empty() && !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let trimmed = sanitized.trim_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_file(path: &Path, data: &str) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
