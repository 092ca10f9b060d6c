//! Wiring of a ledger store, a rate table and the configuration.

use std::{fs, path::Path};

use chrono::{DateTime, Duration, Utc};
use ledgerline_config::Config;
use ledgerline_core::{
    AccountRepair, AuditReport, BudgetAggregator, FutureBalance, ForecastScope, ForecastService,
    FxBook, FxRate, InMemoryStore, LedgerAudit, LedgerStore, PlannedTransactionService,
    SweepReport, TransactionOutcome, TransactionProcessor,
};
use ledgerline_domain::{
    Budget, BudgetDraft, BudgetId, CurrencyCode, Occurrence, TransactionDraft, TransactionId,
    UserId,
};
use ledgerline_storage_json::{JsonLedgerStore, StoragePaths};
use tracing::info;

use crate::errors::LedgerResult;

/// File holding quoted rates next to the ledgers.
pub const RATES_FILE: &str = "fx_rates.json";

/// One ledger plus the services that keep it consistent.
pub struct Engine<S: LedgerStore> {
    store: S,
    fx: FxBook,
    config: Config,
}

impl Engine<JsonLedgerStore> {
    /// Opens the configured active ledger and loads the rate table beside it.
    pub fn open(config: Config) -> LedgerResult<Self> {
        let name = config.active_ledger_name().to_string();
        Self::open_ledger(config, &name)
    }

    pub fn open_ledger(config: Config, name: &str) -> LedgerResult<Self> {
        config.validate()?;
        let paths = StoragePaths {
            ledger_path: config.ledger_path(name),
            backup_root: config.resolve_default_backup_root(),
        };
        let store = JsonLedgerStore::with_retention(paths, config.backup_retention)?;
        let mut engine = Self::with_store(store, config);
        let rates = engine.config.resolve_default_ledger_root().join(RATES_FILE);
        if rates.exists() {
            engine.load_rates(&rates)?;
        }
        Ok(engine)
    }
}

impl Engine<InMemoryStore> {
    pub fn in_memory(config: Config) -> Self {
        Self::with_store(InMemoryStore::new(), config)
    }
}

impl<S: LedgerStore> Engine<S> {
    pub fn with_store(store: S, config: Config) -> Self {
        let fx = FxBook::with_tolerance(config.fx_tolerance_days);
        Self { store, fx, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rates(&self) -> &FxBook {
        &self.fx
    }

    pub fn base_currency(&self) -> CurrencyCode {
        CurrencyCode::new(self.config.base_currency.as_str())
    }

    pub fn add_rate(&mut self, rate: FxRate) {
        self.fx.add_rate(rate);
    }

    /// Adds every rate of a JSON array file; returns how many were read.
    pub fn load_rates(&mut self, path: &Path) -> LedgerResult<usize> {
        let data = fs::read_to_string(path)?;
        let rates: Vec<FxRate> = serde_json::from_str(&data)?;
        let count = rates.len();
        for rate in rates {
            self.fx.add_rate(rate);
        }
        info!(path = %path.display(), count, "fx rates loaded");
        Ok(count)
    }

    pub fn post(&mut self, user: UserId, draft: TransactionDraft) -> LedgerResult<TransactionOutcome> {
        Ok(TransactionProcessor::create(&mut self.store, &self.fx, user, draft)?)
    }

    pub fn amend(
        &mut self,
        user: UserId,
        id: TransactionId,
        draft: TransactionDraft,
    ) -> LedgerResult<TransactionOutcome> {
        Ok(TransactionProcessor::update(&mut self.store, &self.fx, user, id, draft)?)
    }

    pub fn remove(&mut self, user: UserId, id: TransactionId) -> LedgerResult<TransactionOutcome> {
        Ok(TransactionProcessor::delete(&mut self.store, &self.fx, user, id)?)
    }

    pub fn save_budget(
        &mut self,
        user: UserId,
        id: Option<BudgetId>,
        draft: BudgetDraft,
    ) -> LedgerResult<Budget> {
        Ok(BudgetAggregator::create_or_update(
            &mut self.store,
            &self.fx,
            user,
            id,
            draft,
        )?)
    }

    pub fn sweep(&mut self, now: DateTime<Utc>) -> LedgerResult<SweepReport> {
        Ok(BudgetAggregator::sweep_outdated(&mut self.store, &self.fx, now)?)
    }

    pub fn audit(&self) -> LedgerResult<AuditReport> {
        Ok(LedgerAudit::run(&self.store, &self.fx)?)
    }

    pub fn recompute(&mut self) -> LedgerResult<Vec<AccountRepair>> {
        Ok(LedgerAudit::repair(&mut self.store)?)
    }

    /// Occurrences due in the next `days`, including overdue ones within the lookback.
    pub fn upcoming(&self, user: UserId, now: DateTime<Utc>, days: i64) -> LedgerResult<Vec<Occurrence>> {
        Ok(PlannedTransactionService::upcoming(
            &self.store,
            user,
            now,
            now + Duration::days(days),
            false,
            self.config.upcoming_lookback_days,
        )?)
    }

    /// Projected balance of the reported accounts in the base currency.
    pub fn future_balance(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        target: DateTime<Utc>,
    ) -> LedgerResult<FutureBalance> {
        let scope = ForecastScope::new(self.base_currency());
        Ok(ForecastService::future_balance(
            &self.store,
            &self.fx,
            user,
            now,
            target,
            &scope,
        )?)
    }
}
