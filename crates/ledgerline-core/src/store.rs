//! Repository contract the services run against.

use chrono::{DateTime, Utc};
use ledgerline_domain::{
    Account, AccountId, Budget, BudgetId, Category, CategoryId, PlannedTransaction,
    PlannedTransactionId, Transaction, TransactionId, UserId,
};

use crate::CoreResult;

/// Abstraction over persistence backends holding one ledger's rows.
///
/// `insert_*` assigns the next primary key and returns the stored row.
/// `save_*` overwrites an existing row and fails when the key is unknown.
/// Lookups return soft-deleted rows too; callers decide how to treat them.
pub trait LedgerStore {
    fn insert_account(&mut self, account: Account) -> CoreResult<Account>;
    fn account(&self, id: AccountId) -> CoreResult<Option<Account>>;
    fn save_account(&mut self, account: &Account) -> CoreResult<()>;
    fn accounts_for_user(&self, user: UserId) -> CoreResult<Vec<Account>>;
    fn all_accounts(&self) -> CoreResult<Vec<Account>>;

    fn insert_category(&mut self, category: Category) -> CoreResult<Category>;
    fn category(&self, id: CategoryId) -> CoreResult<Option<Category>>;
    fn save_category(&mut self, category: &Category) -> CoreResult<()>;
    fn categories_for_user(&self, user: UserId) -> CoreResult<Vec<Category>>;

    fn insert_transaction(&mut self, transaction: Transaction) -> CoreResult<Transaction>;
    fn transaction(&self, id: TransactionId) -> CoreResult<Option<Transaction>>;
    fn save_transaction(&mut self, transaction: &Transaction) -> CoreResult<()>;
    /// Live transactions of one account ordered by `(date_time, id)`.
    fn live_transactions_for_account(&self, account: AccountId) -> CoreResult<Vec<Transaction>>;
    /// Live transactions of one owner with `from <= date_time < to`, ordered by `(date_time, id)`.
    fn live_transactions_between(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Transaction>>;
    fn all_transactions(&self) -> CoreResult<Vec<Transaction>>;

    fn insert_budget(&mut self, budget: Budget) -> CoreResult<Budget>;
    fn budget(&self, id: BudgetId) -> CoreResult<Option<Budget>>;
    fn save_budget(&mut self, budget: &Budget) -> CoreResult<()>;
    fn budgets_for_user(&self, user: UserId) -> CoreResult<Vec<Budget>>;
    fn all_budgets(&self) -> CoreResult<Vec<Budget>>;

    fn insert_planned(&mut self, planned: PlannedTransaction) -> CoreResult<PlannedTransaction>;
    fn planned(&self, id: PlannedTransactionId) -> CoreResult<Option<PlannedTransaction>>;
    fn save_planned(&mut self, planned: &PlannedTransaction) -> CoreResult<()>;
    fn planned_for_user(&self, user: UserId) -> CoreResult<Vec<PlannedTransaction>>;

    /// Runs `op` as one storage transaction: every write it made is kept when it
    /// returns `Ok`, and none is kept when it returns `Err`.
    fn atomically<T, F>(&mut self, op: F) -> CoreResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> CoreResult<T>;
}
