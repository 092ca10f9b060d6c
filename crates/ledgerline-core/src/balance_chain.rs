//! Running-balance chain maintenance for a single account.

use ledgerline_domain::{AccountId, TransactionId};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{store::LedgerStore, CoreError, CoreResult};

/// One transaction whose stored running balance disagrees with the replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDrift {
    pub transaction_id: TransactionId,
    pub stored: Decimal,
    pub expected: Decimal,
}

/// Result of replaying an account's chain without writing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    pub account_id: AccountId,
    pub stored_balance: Decimal,
    pub replayed_balance: Decimal,
    pub drift: Vec<ChainDrift>,
}

impl ChainReport {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty() && self.stored_balance == self.replayed_balance
    }
}

pub struct BalanceChainRecalculator;

impl BalanceChainRecalculator {
    /// Rewrites `new_balance` on every live transaction of the account, seeded
    /// from its `initial_balance`, and returns the final running balance.
    pub fn recompute<S: LedgerStore>(store: &mut S, account_id: AccountId) -> CoreResult<Decimal> {
        let account = store
            .account(account_id)?
            .ok_or(CoreError::InvalidAccount(account_id))?;
        let transactions = store.live_transactions_for_account(account_id)?;
        let mut running = account.initial_balance;
        let mut rewritten = 0usize;
        for mut txn in transactions {
            running += txn.signed_amount();
            if txn.new_balance != running {
                txn.new_balance = running;
                store.save_transaction(&txn)?;
                rewritten += 1;
            }
        }
        debug!(account = %account_id, rewritten, balance = %running, "balance chain recomputed");
        Ok(running)
    }

    /// Replays the chain and reports drift without touching storage.
    pub fn verify<S: LedgerStore>(store: &S, account_id: AccountId) -> CoreResult<ChainReport> {
        let account = store
            .account(account_id)?
            .ok_or(CoreError::InvalidAccount(account_id))?;
        let mut running = account.initial_balance;
        let mut drift = Vec::new();
        for txn in store.live_transactions_for_account(account_id)? {
            running += txn.signed_amount();
            if txn.new_balance != running {
                drift.push(ChainDrift {
                    transaction_id: txn.id,
                    stored: txn.new_balance,
                    expected: running,
                });
            }
        }
        Ok(ChainReport {
            account_id,
            stored_balance: account.balance,
            replayed_balance: running,
            drift,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::{TimeZone, Utc};
    use ledgerline_domain::{Account, CurrencyCode, Transaction, UserId};
    use rust_decimal_macros::dec;

    fn seed(store: &mut InMemoryStore, account: &Account, day: u32, amount: Decimal, income: bool) {
        store
            .insert_transaction(Transaction {
                id: TransactionId::default(),
                user_id: account.user_id,
                account_id: account.id,
                category_id: None,
                amount,
                currency: account.currency.clone(),
                is_income: income,
                is_transfer: false,
                linked_transaction_id: None,
                exchange_rate: None,
                new_balance: Decimal::ZERO,
                date_time: Utc
                    .with_ymd_and_hms(2024, 5, day, 12, 0, 0)
                    .single()
                    .expect("valid instant"),
                label: None,
                notes: None,
                is_deleted: false,
            })
            .expect("insert transaction");
    }

    #[test]
    fn chain_is_replayed_in_date_order() {
        let mut store = InMemoryStore::new();
        let account = store
            .insert_account(Account::new(
                UserId::new(),
                "Checking",
                CurrencyCode::new("USD"),
                dec!(100),
            ))
            .expect("insert account");
        seed(&mut store, &account, 10, dec!(30), false);
        seed(&mut store, &account, 2, dec!(50), true);
        seed(&mut store, &account, 10, dec!(5), false);

        let before = BalanceChainRecalculator::verify(&store, account.id).expect("verify");
        assert_eq!(before.drift.len(), 3);

        let balance = BalanceChainRecalculator::recompute(&mut store, account.id).expect("recompute");
        assert_eq!(balance, dec!(115));

        let chain: Vec<Decimal> = store
            .live_transactions_for_account(account.id)
            .expect("list")
            .into_iter()
            .map(|txn| txn.new_balance)
            .collect();
        assert_eq!(chain, vec![dec!(150), dec!(120), dec!(115)]);

        let after = BalanceChainRecalculator::verify(&store, account.id).expect("verify");
        assert!(after.drift.is_empty());
    }

    #[test]
    fn unknown_account_is_rejected() {
        let mut store = InMemoryStore::new();
        let err = BalanceChainRecalculator::recompute(&mut store, AccountId(9)).expect_err("missing");
        assert!(matches!(err, CoreError::InvalidAccount(AccountId(9))));
    }
}
