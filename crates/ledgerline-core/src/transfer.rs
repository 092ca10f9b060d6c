//! Two-leg bookkeeping for transfers between accounts.
//!
//! A transfer is an expense leg on the source account and an income leg on the
//! target account, cross-linked through `linked_transaction_id`. Every function
//! here runs inside the caller's storage transaction, so both legs commit
//! together or not at all.

use chrono::{DateTime, Utc};
use ledgerline_domain::{
    Account, Transaction, TransactionDraft, TransactionId, TransferDraft, UserId,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    access::{adjust_balance, owned_account},
    currency::CurrencyConverter,
    store::LedgerStore,
    transaction_processor::TransactionSnapshot,
    CoreError, CoreResult,
};

const RATE_PRECISION: u32 = 6;

/// Validated target side of a transfer, priced in the target currency.
#[derive(Debug, Clone)]
pub(crate) struct TransferQuote {
    pub source: Account,
    pub target: Account,
    pub target_amount: Decimal,
    pub exchange_rate: Option<Decimal>,
}

/// The two persisted legs of one transfer.
#[derive(Debug, Clone)]
pub(crate) struct TransferLegs {
    pub source: Transaction,
    pub target: Transaction,
}

pub struct TransferCoordinator;

impl TransferCoordinator {
    /// Checks both accounts and works out how much the target receives.
    ///
    /// Same-currency transfers credit the debited amount. Otherwise the
    /// caller's `target_amount` wins, then the caller's rate, then the converter.
    pub(crate) fn quote<S: LedgerStore>(
        store: &S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        draft: &TransactionDraft,
        transfer: &TransferDraft,
        at: DateTime<Utc>,
    ) -> CoreResult<TransferQuote> {
        let source = owned_account(store, draft.account_id, user)?;
        if transfer.target_account_id == source.id {
            return Err(CoreError::InvalidTransaction(
                "transfer source and target must be different accounts".into(),
            ));
        }
        let target = owned_account(store, transfer.target_account_id, user)?;
        let amount = draft.amount;

        let (target_amount, exchange_rate) = if source.currency == target.currency {
            (amount, None)
        } else if let Some(target_amount) = transfer.target_amount {
            (target_amount, implied_rate(amount, target_amount))
        } else if let Some(rate) = transfer.exchange_rate {
            (amount * rate, Some(rate))
        } else {
            let converted = fx.convert(amount, &source.currency, &target.currency, at.date_naive())?;
            (converted, implied_rate(amount, converted))
        };

        Ok(TransferQuote {
            source,
            target,
            target_amount,
            exchange_rate,
        })
    }

    /// Posts a new transfer: debit the source, credit the target, link both legs.
    pub(crate) fn create<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        draft: &TransactionDraft,
        transfer: &TransferDraft,
        at: DateTime<Utc>,
    ) -> CoreResult<TransferLegs> {
        let quote = Self::quote(store, fx, user, draft, transfer, at)?;

        adjust_balance(store, quote.source.id, -draft.amount)?;
        let mut source = store.insert_transaction(source_leg(
            TransactionId::default(),
            user,
            &quote,
            draft,
            at,
        ))?;

        adjust_balance(store, quote.target.id, quote.target_amount)?;
        let mut target_row = target_leg(TransactionId::default(), user, &quote, draft, at);
        target_row.linked_transaction_id = Some(source.id);
        let target = store.insert_transaction(target_row)?;

        source.linked_transaction_id = Some(target.id);
        store.save_transaction(&source)?;
        debug!(source = %source.id, target = %target.id, "transfer legs linked");
        Ok(TransferLegs { source, target })
    }

    /// Rewrites an existing transaction as a transfer.
    ///
    /// When `before` is already a transfer both legs are reversed and
    /// reapplied in place. When it is a direct transaction its row becomes
    /// the source leg and a new target leg is created.
    pub(crate) fn update<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        before: &TransactionSnapshot,
        draft: &TransactionDraft,
        transfer: &TransferDraft,
        at: DateTime<Utc>,
    ) -> CoreResult<TransferLegs> {
        let quote = Self::quote(store, fx, user, draft, transfer, at)?;
        Self::reverse_all(store, before)?;

        adjust_balance(store, quote.source.id, -draft.amount)?;
        adjust_balance(store, quote.target.id, quote.target_amount)?;

        match before.target() {
            Some(old_target) => {
                let source_id = before.source().id;
                let target_id = old_target.id;
                let mut source = source_leg(source_id, user, &quote, draft, at);
                let mut target = target_leg(target_id, user, &quote, draft, at);
                source.linked_transaction_id = Some(target_id);
                target.linked_transaction_id = Some(source_id);
                store.save_transaction(&source)?;
                store.save_transaction(&target)?;
                debug!(source = %source_id, target = %target_id, "transfer legs rewritten");
                Ok(TransferLegs { source, target })
            }
            None => {
                let source_id = before.transaction.id;
                let mut source = source_leg(source_id, user, &quote, draft, at);
                let mut target_row = target_leg(TransactionId::default(), user, &quote, draft, at);
                target_row.linked_transaction_id = Some(source_id);
                let target = store.insert_transaction(target_row)?;
                source.linked_transaction_id = Some(target.id);
                store.save_transaction(&source)?;
                debug!(source = %source_id, target = %target.id, "direct transaction promoted to transfer");
                Ok(TransferLegs { source, target })
            }
        }
    }

    /// Reverses both legs and tombstones them.
    pub(crate) fn delete<S: LedgerStore>(
        store: &mut S,
        before: &TransactionSnapshot,
    ) -> CoreResult<Vec<Transaction>> {
        Self::reverse_all(store, before)?;
        let mut removed = Vec::with_capacity(2);
        for leg in before.legs() {
            let mut tombstone = leg.clone();
            tombstone.is_deleted = true;
            store.save_transaction(&tombstone)?;
            removed.push(tombstone);
        }
        Ok(removed)
    }

    /// Unpairs a transfer so its `before.transaction` row can become a direct
    /// transaction. Both legs are reversed and the other leg is tombstoned.
    pub(crate) fn detach<S: LedgerStore>(
        store: &mut S,
        before: &TransactionSnapshot,
    ) -> CoreResult<Option<Transaction>> {
        Self::reverse_all(store, before)?;
        match before.linked.as_ref() {
            Some(linked) => {
                let mut tombstone = linked.clone();
                tombstone.is_deleted = true;
                store.save_transaction(&tombstone)?;
                debug!(kept = %before.transaction.id, removed = %linked.id, "transfer detached");
                Ok(Some(tombstone))
            }
            None => Ok(None),
        }
    }

    /// Takes back the balance effect of every leg in the snapshot.
    pub(crate) fn reverse_all<S: LedgerStore>(
        store: &mut S,
        before: &TransactionSnapshot,
    ) -> CoreResult<()> {
        for leg in before.legs() {
            adjust_balance(store, leg.account_id, -leg.signed_amount())?;
        }
        Ok(())
    }
}

fn implied_rate(amount: Decimal, target_amount: Decimal) -> Option<Decimal> {
    if amount.is_zero() {
        None
    } else {
        Some((target_amount / amount).round_dp(RATE_PRECISION))
    }
}

fn source_leg(
    id: TransactionId,
    user: UserId,
    quote: &TransferQuote,
    draft: &TransactionDraft,
    at: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id,
        user_id: user,
        account_id: quote.source.id,
        category_id: None,
        amount: draft.amount,
        currency: quote.source.currency.clone(),
        is_income: false,
        is_transfer: true,
        linked_transaction_id: None,
        exchange_rate: quote.exchange_rate,
        new_balance: Decimal::ZERO,
        date_time: at,
        label: draft.label.clone(),
        notes: draft.notes.clone(),
        is_deleted: false,
    }
}

fn target_leg(
    id: TransactionId,
    user: UserId,
    quote: &TransferQuote,
    draft: &TransactionDraft,
    at: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id,
        user_id: user,
        account_id: quote.target.id,
        category_id: None,
        amount: quote.target_amount,
        currency: quote.target.currency.clone(),
        is_income: true,
        is_transfer: true,
        linked_transaction_id: None,
        exchange_rate: None,
        new_balance: Decimal::ZERO,
        date_time: at,
        label: draft.label.clone(),
        notes: draft.notes.clone(),
        is_deleted: false,
    }
}
