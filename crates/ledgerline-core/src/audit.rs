//! Consistency checks over a whole ledger, plus balance repair.

use std::collections::HashMap;

use ledgerline_domain::{Account, AccountId, BudgetId, Transaction, TransactionId};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    balance_chain::{BalanceChainRecalculator, ChainReport},
    budget_aggregator::BudgetAggregator,
    currency::CurrencyConverter,
    store::LedgerStore,
    CoreResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDrift {
    pub budget_id: BudgetId,
    pub stored: Decimal,
    pub expected: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    /// Accounts whose balance or chain disagrees with a replay.
    pub chains: Vec<ChainReport>,
    pub budgets: Vec<BudgetDrift>,
    pub warnings: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.chains.is_empty() && self.budgets.is_empty() && self.warnings.is_empty()
    }
}

/// An account whose stored balance was replaced by its replayed chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRepair {
    pub account_id: AccountId,
    pub previous: Decimal,
    pub replayed: Decimal,
}

pub struct LedgerAudit;

impl LedgerAudit {
    pub fn run<S: LedgerStore>(store: &S, fx: &dyn CurrencyConverter) -> CoreResult<AuditReport> {
        let mut report = AuditReport::default();

        for account in store.all_accounts()?.iter().filter(|a| a.is_live()) {
            let chain = BalanceChainRecalculator::verify(store, account.id)?;
            if !chain.is_consistent() {
                report.chains.push(chain);
            }
        }

        report.warnings = transfer_warnings(&store.all_transactions()?, &store.all_accounts()?);

        for budget in store.all_budgets()?.iter().filter(|b| b.is_active()) {
            match BudgetAggregator::collected_for(store, fx, budget) {
                Ok(expected) if expected != budget.collected_amount => {
                    report.budgets.push(BudgetDrift {
                        budget_id: budget.id,
                        stored: budget.collected_amount,
                        expected,
                    })
                }
                Ok(_) => {}
                Err(err) => report
                    .warnings
                    .push(format!("budget {} could not be rescanned: {}", budget.id, err)),
            }
        }

        if report.is_clean() {
            info!("ledger audit clean");
        } else {
            warn!(
                chains = report.chains.len(),
                budgets = report.budgets.len(),
                warnings = report.warnings.len(),
                "ledger audit found problems"
            );
        }
        Ok(report)
    }

    /// Rewrites every live account's chain and resets drifted balances to the replay.
    pub fn repair<S: LedgerStore>(store: &mut S) -> CoreResult<Vec<AccountRepair>> {
        let repairs = store.atomically(|store| {
            let mut repairs = Vec::new();
            for mut account in store.all_accounts()?.into_iter().filter(Account::is_live) {
                let replayed = BalanceChainRecalculator::recompute(store, account.id)?;
                if account.balance != replayed {
                    warn!(
                        account = %account.id,
                        stored = %account.balance,
                        %replayed,
                        "resetting account balance to its chain"
                    );
                    repairs.push(AccountRepair {
                        account_id: account.id,
                        previous: account.balance,
                        replayed,
                    });
                    account.balance = replayed;
                    store.save_account(&account)?;
                }
            }
            Ok(repairs)
        })?;
        info!(repaired = repairs.len(), "balance chains recomputed");
        Ok(repairs)
    }
}

/// Detects broken transfer links and rows posted against unknown accounts.
pub fn transfer_warnings(transactions: &[Transaction], accounts: &[Account]) -> Vec<String> {
    let by_id: HashMap<TransactionId, &Transaction> =
        transactions.iter().map(|txn| (txn.id, txn)).collect();
    let mut warnings = Vec::new();

    for txn in transactions.iter().filter(|txn| txn.is_live()) {
        if !accounts.iter().any(|account| account.id == txn.account_id) {
            warnings.push(format!(
                "transaction {} references unknown account {}",
                txn.id, txn.account_id
            ));
        }
        let Some(linked_id) = txn.linked_transaction_id else {
            if txn.is_transfer {
                warnings.push(format!("transfer {} has no linked leg", txn.id));
            }
            continue;
        };
        let Some(linked) = by_id.get(&linked_id) else {
            warnings.push(format!(
                "transaction {} links to missing {}",
                txn.id, linked_id
            ));
            continue;
        };
        if linked.is_deleted {
            warnings.push(format!(
                "transaction {} links to deleted {}",
                txn.id, linked_id
            ));
        }
        if linked.linked_transaction_id != Some(txn.id) {
            warnings.push(format!(
                "transfer {} is not linked back from {}",
                txn.id, linked_id
            ));
        }
        if linked.is_income == txn.is_income {
            warnings.push(format!(
                "transfer legs {} and {} have the same direction",
                txn.id, linked_id
            ));
        }
    }
    warnings
}
