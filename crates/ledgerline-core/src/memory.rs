//! In-process store with snapshot/restore storage transactions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ledgerline_domain::{
    Account, AccountId, Budget, BudgetId, Category, CategoryId, PlannedTransaction,
    PlannedTransactionId, Transaction, TransactionId, UserId,
};
use serde::{Deserialize, Serialize};

use crate::{store::LedgerStore, CoreError, CoreResult};

const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Serializable image of every table in a ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSnapshot {
    #[serde(default = "LedgerSnapshot::schema_version_default")]
    pub schema_version: u8,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub budgets: Vec<Budget>,
    #[serde(default)]
    pub planned_transactions: Vec<PlannedTransaction>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            accounts: Vec::new(),
            categories: Vec::new(),
            transactions: Vec::new(),
            budgets: Vec::new(),
            planned_transactions: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    categories: BTreeMap<CategoryId, Category>,
    transactions: BTreeMap<TransactionId, Transaction>,
    budgets: BTreeMap<BudgetId, Budget>,
    planned: BTreeMap<PlannedTransactionId, PlannedTransaction>,
}

/// Reference [`LedgerStore`] keeping every row in ordered maps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Tables,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> CoreResult<Self> {
        if snapshot.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(CoreError::Storage(format!(
                "snapshot schema {} is newer than supported {}",
                snapshot.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }
        let mut tables = Tables::default();
        for account in snapshot.accounts {
            tables.accounts.insert(account.id, account);
        }
        for category in snapshot.categories {
            tables.categories.insert(category.id, category);
        }
        for txn in snapshot.transactions {
            tables.transactions.insert(txn.id, txn);
        }
        for budget in snapshot.budgets {
            tables.budgets.insert(budget.id, budget);
        }
        for planned in snapshot.planned_transactions {
            tables.planned.insert(planned.id, planned);
        }
        Ok(Self { tables })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            accounts: self.tables.accounts.values().cloned().collect(),
            categories: self.tables.categories.values().cloned().collect(),
            transactions: self.tables.transactions.values().cloned().collect(),
            budgets: self.tables.budgets.values().cloned().collect(),
            planned_transactions: self.tables.planned.values().cloned().collect(),
            updated_at: Utc::now(),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.transactions.len()
    }
}

fn next_key<K: Ord + Copy, V>(table: &BTreeMap<K, V>, raw: impl Fn(K) -> u64) -> u64 {
    table.keys().next_back().map(|key| raw(*key)).unwrap_or(0) + 1
}

fn missing(kind: &str, id: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(format!("cannot save unknown {} {}", kind, id))
}

fn by_chain_order(rows: &mut [Transaction]) {
    rows.sort_by_key(Transaction::chain_key);
}

impl LedgerStore for InMemoryStore {
    fn insert_account(&mut self, mut account: Account) -> CoreResult<Account> {
        account.id = AccountId(next_key(&self.tables.accounts, |id| id.0));
        self.tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> CoreResult<Option<Account>> {
        Ok(self.tables.accounts.get(&id).cloned())
    }

    fn save_account(&mut self, account: &Account) -> CoreResult<()> {
        let slot = self
            .tables
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| missing("account", account.id))?;
        *slot = account.clone();
        Ok(())
    }

    fn accounts_for_user(&self, user: UserId) -> CoreResult<Vec<Account>> {
        Ok(self
            .tables
            .accounts
            .values()
            .filter(|account| account.user_id == user)
            .cloned()
            .collect())
    }

    fn all_accounts(&self) -> CoreResult<Vec<Account>> {
        Ok(self.tables.accounts.values().cloned().collect())
    }

    fn insert_category(&mut self, mut category: Category) -> CoreResult<Category> {
        category.id = CategoryId(next_key(&self.tables.categories, |id| id.0));
        self.tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    fn category(&self, id: CategoryId) -> CoreResult<Option<Category>> {
        Ok(self.tables.categories.get(&id).cloned())
    }

    fn save_category(&mut self, category: &Category) -> CoreResult<()> {
        let slot = self
            .tables
            .categories
            .get_mut(&category.id)
            .ok_or_else(|| missing("category", category.id))?;
        *slot = category.clone();
        Ok(())
    }

    fn categories_for_user(&self, user: UserId) -> CoreResult<Vec<Category>> {
        Ok(self
            .tables
            .categories
            .values()
            .filter(|category| category.user_id == user)
            .cloned()
            .collect())
    }

    fn insert_transaction(&mut self, mut transaction: Transaction) -> CoreResult<Transaction> {
        transaction.id = TransactionId(next_key(&self.tables.transactions, |id| id.0));
        self.tables
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    fn transaction(&self, id: TransactionId) -> CoreResult<Option<Transaction>> {
        Ok(self.tables.transactions.get(&id).cloned())
    }

    fn save_transaction(&mut self, transaction: &Transaction) -> CoreResult<()> {
        let slot = self
            .tables
            .transactions
            .get_mut(&transaction.id)
            .ok_or_else(|| missing("transaction", transaction.id))?;
        *slot = transaction.clone();
        Ok(())
    }

    fn live_transactions_for_account(&self, account: AccountId) -> CoreResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .tables
            .transactions
            .values()
            .filter(|txn| txn.account_id == account && txn.is_live())
            .cloned()
            .collect();
        by_chain_order(&mut rows);
        Ok(rows)
    }

    fn live_transactions_between(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .tables
            .transactions
            .values()
            .filter(|txn| {
                txn.user_id == user && txn.is_live() && txn.date_time >= from && txn.date_time < to
            })
            .cloned()
            .collect();
        by_chain_order(&mut rows);
        Ok(rows)
    }

    fn all_transactions(&self) -> CoreResult<Vec<Transaction>> {
        Ok(self.tables.transactions.values().cloned().collect())
    }

    fn insert_budget(&mut self, mut budget: Budget) -> CoreResult<Budget> {
        budget.id = BudgetId(next_key(&self.tables.budgets, |id| id.0));
        self.tables.budgets.insert(budget.id, budget.clone());
        Ok(budget)
    }

    fn budget(&self, id: BudgetId) -> CoreResult<Option<Budget>> {
        Ok(self.tables.budgets.get(&id).cloned())
    }

    fn save_budget(&mut self, budget: &Budget) -> CoreResult<()> {
        let slot = self
            .tables
            .budgets
            .get_mut(&budget.id)
            .ok_or_else(|| missing("budget", budget.id))?;
        *slot = budget.clone();
        Ok(())
    }

    fn budgets_for_user(&self, user: UserId) -> CoreResult<Vec<Budget>> {
        Ok(self
            .tables
            .budgets
            .values()
            .filter(|budget| budget.user_id == user)
            .cloned()
            .collect())
    }

    fn all_budgets(&self) -> CoreResult<Vec<Budget>> {
        Ok(self.tables.budgets.values().cloned().collect())
    }

    fn insert_planned(&mut self, mut planned: PlannedTransaction) -> CoreResult<PlannedTransaction> {
        planned.id = PlannedTransactionId(next_key(&self.tables.planned, |id| id.0));
        self.tables.planned.insert(planned.id, planned.clone());
        Ok(planned)
    }

    fn planned(&self, id: PlannedTransactionId) -> CoreResult<Option<PlannedTransaction>> {
        Ok(self.tables.planned.get(&id).cloned())
    }

    fn save_planned(&mut self, planned: &PlannedTransaction) -> CoreResult<()> {
        let slot = self
            .tables
            .planned
            .get_mut(&planned.id)
            .ok_or_else(|| missing("planned transaction", planned.id))?;
        *slot = planned.clone();
        Ok(())
    }

    fn planned_for_user(&self, user: UserId) -> CoreResult<Vec<PlannedTransaction>> {
        Ok(self
            .tables
            .planned
            .values()
            .filter(|planned| planned.user_id == user)
            .cloned()
            .collect())
    }

    fn atomically<T, F>(&mut self, op: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Self) -> CoreResult<T>,
    {
        let checkpoint = self.tables.clone();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.tables = checkpoint;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_domain::CurrencyCode;
    use rust_decimal_macros::dec;

    #[test]
    fn keys_are_assigned_sequentially() {
        let mut store = InMemoryStore::new();
        let user = UserId::new();
        let first = store
            .insert_account(Account::new(user, "Cash", CurrencyCode::new("USD"), dec!(0)))
            .expect("insert");
        let second = store
            .insert_account(Account::new(user, "Bank", CurrencyCode::new("USD"), dec!(0)))
            .expect("insert");
        assert_eq!(first.id, AccountId(1));
        assert_eq!(second.id, AccountId(2));
    }

    #[test]
    fn failed_storage_transaction_discards_writes() {
        let mut store = InMemoryStore::new();
        let user = UserId::new();
        let err = store
            .atomically(|store| {
                store.insert_account(Account::new(
                    user,
                    "Cash",
                    CurrencyCode::new("USD"),
                    dec!(10),
                ))?;
                Err::<(), _>(CoreError::Validation("abort".into()))
            })
            .expect_err("operation aborts");
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(store.accounts_for_user(user).expect("list").is_empty());
    }

    #[test]
    fn saving_unknown_rows_fails() {
        let mut store = InMemoryStore::new();
        let account = Account::new(UserId::new(), "Ghost", CurrencyCode::new("USD"), dec!(0));
        let err = store.save_account(&account).expect_err("unknown row");
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn snapshot_restores_tables() {
        let mut store = InMemoryStore::new();
        let user = UserId::new();
        store
            .insert_account(Account::new(user, "Cash", CurrencyCode::new("EUR"), dec!(5)))
            .expect("insert");
        let restored = InMemoryStore::from_snapshot(store.snapshot()).expect("restore");
        let accounts = restored.accounts_for_user(user).expect("list");
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].balance, dec!(5));
    }
}
