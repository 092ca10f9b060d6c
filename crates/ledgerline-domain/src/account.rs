//! Domain types representing money accounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;

/// A money container with a running signed balance.
///
/// `balance` always equals `initial_balance` plus the signed amounts of the
/// account's live transactions. Only the transaction processor mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub name: String,
    pub currency: CurrencyCode,
    pub initial_balance: Decimal,
    pub balance: Decimal,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default = "Account::default_show_in_reports")]
    pub show_in_reports: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        currency: CurrencyCode,
        initial_balance: Decimal,
    ) -> Self {
        Self {
            id: AccountId::default(),
            user_id,
            name: name.into(),
            currency,
            initial_balance,
            balance: initial_balance,
            is_hidden: false,
            show_in_reports: true,
            is_archived: false,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn default_show_in_reports() -> bool {
        true
    }

    pub fn hidden_from_reports(mut self) -> Self {
        self.show_in_reports = false;
        self
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// Adds a signed delta to the running balance.
    pub fn apply(&mut self, signed_amount: Decimal) {
        self.balance += signed_amount;
    }
}

impl Owned for Account {
    fn owner(&self) -> UserId {
        self.user_id
    }
}
