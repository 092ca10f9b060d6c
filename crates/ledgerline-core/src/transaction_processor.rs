//! Create, update and delete of posted transactions.
//!
//! Each operation is one storage transaction: validate, reverse the previous
//! balance effect (if any), apply the new one, recompute the balance chains of
//! every touched account, then notify budgets.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ledgerline_domain::{Account, AccountId, Transaction, TransactionDraft, TransactionId, UserId};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    access::{adjust_balance, ensure_owner, matching_category, owned_account},
    balance_chain::BalanceChainRecalculator,
    budget_aggregator::{BudgetAggregator, BudgetPostingReport},
    currency::CurrencyConverter,
    store::LedgerStore,
    transfer::TransferCoordinator,
    CoreError, CoreResult,
};

/// What a processor call left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    /// The row addressed by the call, as persisted.
    pub transaction: Transaction,
    /// The other leg when the row is (or was) part of a transfer.
    pub linked: Option<Transaction>,
    pub budgets: BudgetPostingReport,
}

/// Immutable copy of a transaction and its linked leg, taken before any mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSnapshot {
    pub transaction: Transaction,
    pub linked: Option<Transaction>,
}

impl TransactionSnapshot {
    /// Loads a live transaction owned by `user` together with its live linked leg.
    pub fn capture<S: LedgerStore>(store: &S, id: TransactionId, user: UserId) -> CoreResult<Self> {
        let transaction = store
            .transaction(id)?
            .filter(Transaction::is_live)
            .ok_or_else(|| CoreError::InvalidTransaction(format!("{} does not exist", id)))?;
        ensure_owner(&transaction, user, &id.to_string())?;

        let linked = match transaction.linked_transaction_id {
            Some(linked_id) => Some(
                store
                    .transaction(linked_id)?
                    .filter(Transaction::is_live)
                    .ok_or_else(|| {
                        CoreError::InvalidTransaction(format!(
                            "{} is linked to missing {}",
                            id, linked_id
                        ))
                    })?,
            ),
            None => None,
        };
        if transaction.is_transfer && linked.is_none() {
            return Err(CoreError::InvalidTransaction(format!(
                "transfer {} has no linked leg",
                id
            )));
        }
        Ok(Self {
            transaction,
            linked,
        })
    }

    /// The debited leg of a transfer, or the transaction itself.
    pub fn source(&self) -> &Transaction {
        match &self.linked {
            Some(linked) if self.transaction.is_income => linked,
            _ => &self.transaction,
        }
    }

    /// The credited leg of a transfer.
    pub fn target(&self) -> Option<&Transaction> {
        let linked = self.linked.as_ref()?;
        if self.transaction.is_income {
            Some(&self.transaction)
        } else {
            Some(linked)
        }
    }

    pub fn legs(&self) -> impl Iterator<Item = &Transaction> {
        std::iter::once(&self.transaction).chain(self.linked.iter())
    }
}

pub struct TransactionProcessor;

impl TransactionProcessor {
    /// Posts a new direct transaction or transfer for `user`.
    pub fn create<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        draft: TransactionDraft,
    ) -> CoreResult<TransactionOutcome> {
        validate_draft(&draft).map_err(|err| rejected("create", err))?;
        let at = draft.date_time.unwrap_or_else(Utc::now);

        let outcome = store
            .atomically(|store| {
                let (row, linked) = match draft.transfer.as_ref() {
                    Some(transfer) => {
                        let legs = TransferCoordinator::create(store, fx, user, &draft, transfer, at)?;
                        (legs.source, Some(legs.target))
                    }
                    None => {
                        let account = owned_account(store, draft.account_id, user)?;
                        matching_category(store, draft.category_id, draft.is_income, user)?;
                        adjust_balance(store, account.id, draft.signed_amount())?;
                        let row = store.insert_transaction(direct_row(
                            TransactionId::default(),
                            user,
                            &account,
                            &draft,
                            at,
                        ))?;
                        (row, None)
                    }
                };
                let accounts = std::iter::once(row.account_id)
                    .chain(linked.as_ref().map(|leg| leg.account_id))
                    .collect();
                let mut outcome = Self::finish(store, row.id, accounts)?;
                outcome.budgets =
                    BudgetAggregator::on_transaction_posted(store, fx, &outcome.transaction)?;
                Ok(outcome)
            })
            .map_err(|err| rejected("create", err))?;

        info!(
            transaction = %outcome.transaction.id,
            account = %outcome.transaction.account_id,
            transfer = outcome.transaction.is_transfer,
            "transaction created"
        );
        Ok(outcome)
    }

    /// Replaces transaction `id` with `draft`, reversing its previous effect first.
    ///
    /// An omitted `date_time` keeps the stored one. The draft may change the
    /// shape: a direct transaction can become a transfer and vice versa.
    pub fn update<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        id: TransactionId,
        draft: TransactionDraft,
    ) -> CoreResult<TransactionOutcome> {
        validate_draft(&draft).map_err(|err| rejected("update", err))?;

        let outcome = store
            .atomically(|store| {
                let before = TransactionSnapshot::capture(store, id, user)?;
                let at = draft.date_time.unwrap_or(before.transaction.date_time);
                let mut accounts: BTreeSet<AccountId> =
                    before.legs().map(|leg| leg.account_id).collect();

                match draft.transfer.as_ref() {
                    Some(transfer) => {
                        let legs = TransferCoordinator::update(
                            store, fx, user, &before, &draft, transfer, at,
                        )?;
                        accounts.insert(legs.source.account_id);
                        accounts.insert(legs.target.account_id);
                    }
                    None => {
                        let account = owned_account(store, draft.account_id, user)?;
                        matching_category(store, draft.category_id, draft.is_income, user)?;
                        if before.linked.is_some() {
                            TransferCoordinator::detach(store, &before)?;
                        } else {
                            TransferCoordinator::reverse_all(store, &before)?;
                        }
                        adjust_balance(store, account.id, draft.signed_amount())?;
                        store.save_transaction(&direct_row(id, user, &account, &draft, at))?;
                        accounts.insert(account.id);
                    }
                }

                let mut outcome = Self::finish(store, id, accounts)?;
                outcome.budgets = BudgetAggregator::on_transaction_replaced(
                    store,
                    fx,
                    &before.transaction,
                    &outcome.transaction,
                )?;
                Ok(outcome)
            })
            .map_err(|err| rejected("update", err))?;

        info!(
            transaction = %id,
            account = %outcome.transaction.account_id,
            transfer = outcome.transaction.is_transfer,
            "transaction updated"
        );
        Ok(outcome)
    }

    /// Reverses and tombstones transaction `id`; a transfer takes its linked leg with it.
    pub fn delete<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        id: TransactionId,
    ) -> CoreResult<TransactionOutcome> {
        let outcome = store
            .atomically(|store| {
                let before = TransactionSnapshot::capture(store, id, user)?;
                let removed = if before.linked.is_some() {
                    TransferCoordinator::delete(store, &before)?
                } else {
                    TransferCoordinator::reverse_all(store, &before)?;
                    let mut tombstone = before.transaction.clone();
                    tombstone.is_deleted = true;
                    store.save_transaction(&tombstone)?;
                    vec![tombstone]
                };

                for account in before.legs().map(|leg| leg.account_id).collect::<BTreeSet<_>>() {
                    Self::recompute_chain(store, account)?;
                }
                let budgets = BudgetAggregator::on_transaction_reversed(store, fx, &before.transaction)?;

                let mut transaction = None;
                let mut linked = None;
                for row in removed {
                    if row.id == id {
                        transaction = Some(row);
                    } else {
                        linked = Some(row);
                    }
                }
                let transaction = transaction.ok_or_else(|| {
                    CoreError::Storage(format!("tombstone for {} was not written", id))
                })?;
                Ok(TransactionOutcome {
                    transaction,
                    linked,
                    budgets,
                })
            })
            .map_err(|err| rejected("delete", err))?;

        info!(
            transaction = %id,
            cascaded = ?outcome.linked.as_ref().map(|leg| leg.id),
            "transaction deleted"
        );
        Ok(outcome)
    }

    /// Recomputes chains and reloads the rows. Budgets are left to the caller.
    fn finish<S: LedgerStore>(
        store: &mut S,
        id: TransactionId,
        accounts: BTreeSet<AccountId>,
    ) -> CoreResult<TransactionOutcome> {
        for account in accounts {
            Self::recompute_chain(store, account)?;
        }
        let transaction = reload(store, id)?;
        let linked = match transaction.linked_transaction_id {
            Some(linked_id) => Some(reload(store, linked_id)?),
            None => None,
        };
        Ok(TransactionOutcome {
            transaction,
            linked,
            budgets: BudgetPostingReport::default(),
        })
    }

    fn recompute_chain<S: LedgerStore>(store: &mut S, account_id: AccountId) -> CoreResult<()> {
        let replayed = BalanceChainRecalculator::recompute(store, account_id)?;
        if let Some(account) = store.account(account_id)? {
            if account.balance != replayed {
                warn!(
                    account = %account_id,
                    stored = %account.balance,
                    replayed = %replayed,
                    "account balance disagrees with its transaction chain"
                );
            }
        }
        Ok(())
    }
}

fn validate_draft(draft: &TransactionDraft) -> CoreResult<()> {
    if draft.amount < Decimal::ZERO {
        return Err(CoreError::InvalidTransaction(
            "amount must not be negative".into(),
        ));
    }
    if let Some(transfer) = draft.transfer.as_ref() {
        if draft.is_income {
            return Err(CoreError::InvalidTransaction(
                "the source leg of a transfer is always an expense".into(),
            ));
        }
        if draft.category_id.is_some() {
            return Err(CoreError::InvalidTransaction(
                "transfers do not carry a category".into(),
            ));
        }
        if transfer.target_amount.map_or(false, |amount| amount < Decimal::ZERO) {
            return Err(CoreError::InvalidTransaction(
                "target amount must not be negative".into(),
            ));
        }
        if transfer.exchange_rate.map_or(false, |rate| rate <= Decimal::ZERO) {
            return Err(CoreError::InvalidTransaction(
                "exchange rate must be positive".into(),
            ));
        }
    }
    Ok(())
}

fn direct_row(
    id: TransactionId,
    user: UserId,
    account: &Account,
    draft: &TransactionDraft,
    at: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id,
        user_id: user,
        account_id: account.id,
        category_id: draft.category_id,
        amount: draft.amount,
        currency: account.currency.clone(),
        is_income: draft.is_income,
        is_transfer: false,
        linked_transaction_id: None,
        exchange_rate: None,
        new_balance: Decimal::ZERO,
        date_time: at,
        label: draft.label.clone(),
        notes: draft.notes.clone(),
        is_deleted: false,
    }
}

fn reload<S: LedgerStore>(store: &S, id: TransactionId) -> CoreResult<Transaction> {
    store
        .transaction(id)?
        .ok_or_else(|| CoreError::Storage(format!("{} vanished during the operation", id)))
}

fn rejected(operation: &str, err: CoreError) -> CoreError {
    warn!(operation, error = %err, "transaction operation rejected");
    err
}
