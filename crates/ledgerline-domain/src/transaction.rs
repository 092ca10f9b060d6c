//! Domain models for posted transactions and the drafts that create them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;

/// A posted movement of money on one account.
///
/// `amount` is a non-negative magnitude; `is_income` carries the sign. A
/// transfer is stored as two linked legs, each an ordinary transaction on its
/// own account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub account_id: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub is_income: bool,
    #[serde(default)]
    pub is_transfer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_transaction_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<Decimal>,
    /// Running balance of the account as of this transaction.
    #[serde(default)]
    pub new_balance: Decimal,
    pub date_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Transaction {
    /// Amount with the sign implied by `is_income`.
    pub fn signed_amount(&self) -> Decimal {
        if self.is_income {
            self.amount
        } else {
            -self.amount
        }
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// Live direct expenses are the only transactions budgets accumulate.
    pub fn counts_toward_budgets(&self) -> bool {
        !self.is_deleted && !self.is_transfer && !self.is_income
    }

    /// Ordering key used by balance chains; ties on `date_time` fall back to insertion order.
    pub fn chain_key(&self) -> (DateTime<Utc>, TransactionId) {
        (self.date_time, self.id)
    }
}

impl Owned for Transaction {
    fn owner(&self) -> UserId {
        self.user_id
    }
}

/// Caller input for creating or replacing a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub is_income: bool,
    pub category_id: Option<CategoryId>,
    /// Defaults to the time of posting when omitted.
    pub date_time: Option<DateTime<Utc>>,
    pub label: Option<String>,
    pub notes: Option<String>,
    pub transfer: Option<TransferDraft>,
}

/// Target side of a transfer. The source side is always an expense.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferDraft {
    pub target_account_id: AccountId,
    pub target_amount: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
}

impl TransactionDraft {
    pub fn expense(account_id: AccountId, amount: Decimal, category_id: CategoryId) -> Self {
        Self::direct(account_id, amount, false, category_id)
    }

    pub fn income(account_id: AccountId, amount: Decimal, category_id: CategoryId) -> Self {
        Self::direct(account_id, amount, true, category_id)
    }

    pub fn transfer(source: AccountId, target: AccountId, amount: Decimal) -> Self {
        Self {
            account_id: source,
            amount,
            is_income: false,
            category_id: None,
            date_time: None,
            label: None,
            notes: None,
            transfer: Some(TransferDraft {
                target_account_id: target,
                target_amount: None,
                exchange_rate: None,
            }),
        }
    }

    fn direct(account_id: AccountId, amount: Decimal, is_income: bool, category: CategoryId) -> Self {
        Self {
            account_id,
            amount,
            is_income,
            category_id: Some(category),
            date_time: None,
            label: None,
            notes: None,
            transfer: None,
        }
    }

    pub fn at(mut self, date_time: DateTime<Utc>) -> Self {
        self.date_time = Some(date_time);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the amount credited to the target account of a transfer.
    pub fn with_target_amount(mut self, target_amount: Decimal) -> Self {
        if let Some(transfer) = self.transfer.as_mut() {
            transfer.target_amount = Some(target_amount);
        }
        self
    }

    pub fn with_exchange_rate(mut self, rate: Decimal) -> Self {
        if let Some(transfer) = self.transfer.as_mut() {
            transfer.exchange_rate = Some(rate);
        }
        self
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    pub fn signed_amount(&self) -> Decimal {
        if self.is_income {
            self.amount
        } else {
            -self.amount
        }
    }
}
