//! Planned future transactions and their recurrence rules.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;

/// Cadence of a recurrence rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Written by a newer client; expansion stops after the first date.
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
            Frequency::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// How a recurrence terminates. `Unbounded` relies on the query window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecurrenceEnd {
    #[default]
    Unbounded,
    OnDate(DateTime<Utc>),
    Count(u32),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "RecurrenceRule::default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub end: RecurrenceEnd,
    /// 0 = Monday .. 6 = Sunday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval,
            end: RecurrenceEnd::Unbounded,
            day_of_week: None,
            day_of_month: None,
        }
    }

    pub fn daily() -> Self {
        Self::new(Frequency::Daily, 1)
    }

    pub fn weekly() -> Self {
        Self::new(Frequency::Weekly, 1)
    }

    pub fn monthly() -> Self {
        Self::new(Frequency::Monthly, 1)
    }

    pub fn yearly() -> Self {
        Self::new(Frequency::Yearly, 1)
    }

    pub fn default_interval() -> u32 {
        1
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = RecurrenceEnd::OnDate(end);
        self
    }

    pub fn times(mut self, count: u32) -> Self {
        self.end = RecurrenceEnd::Count(count);
        self
    }

    pub fn on_day_of_month(mut self, day: u8) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn on_day_of_week(mut self, day: u8) -> Self {
        self.day_of_week = Some(day);
        self
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        match self.end {
            RecurrenceEnd::OnDate(date) => Some(date),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<u32> {
        match self.end {
            RecurrenceEnd::Count(count) => Some(count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedTransaction {
    pub id: PlannedTransactionId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub is_income: bool,
    pub planned_date: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<RecurrenceRule>,
    #[serde(default)]
    pub is_executed: bool,
    #[serde(default = "PlannedTransaction::default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl PlannedTransaction {
    pub fn default_active() -> bool {
        true
    }

    /// The rule driving expansion, if the transaction recurs.
    pub fn rule(&self) -> Option<&RecurrenceRule> {
        if self.is_recurring {
            self.recurrence_rule.as_ref()
        } else {
            None
        }
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

impl Owned for PlannedTransaction {
    fn owner(&self) -> UserId {
        self.user_id
    }
}

/// Caller input for creating or editing a planned transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTransactionDraft {
    pub account_id: Option<AccountId>,
    pub label: Option<String>,
    pub notes: Option<String>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub is_income: bool,
    pub planned_date: DateTime<Utc>,
    pub recurrence_rule: Option<RecurrenceRule>,
    pub is_active: bool,
}

impl PlannedTransactionDraft {
    pub fn new(
        amount: Decimal,
        currency: CurrencyCode,
        is_income: bool,
        planned_date: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: None,
            label: None,
            notes: None,
            amount,
            currency,
            is_income,
            planned_date,
            recurrence_rule: None,
            is_active: true,
        }
    }

    pub fn recurring(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence_rule = Some(rule);
        self
    }

    pub fn for_account(mut self, account: AccountId) -> Self {
        self.account_id = Some(account);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A concrete dated instance of a planned transaction. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Occurrence {
    pub planned_transaction_id: PlannedTransactionId,
    pub occurrence_date: DateTime<Utc>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub is_income: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub is_active: bool,
}

impl Occurrence {
    pub fn signed_amount(&self) -> Decimal {
        if self.is_income {
            self.amount
        } else {
            -self.amount
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_frequency_deserializes_as_unsupported() {
        let rule: RecurrenceRule =
            serde_json::from_str(r#"{"frequency":"fortnightly","interval":2}"#).expect("parse");
        assert_eq!(rule.frequency, Frequency::Unsupported);
        assert_eq!(rule.end, RecurrenceEnd::Unbounded);
    }

    #[test]
    fn end_condition_is_tagged() {
        let rule = RecurrenceRule::monthly().times(3);
        let json = serde_json::to_value(rule).expect("serialize");
        assert_eq!(json["end"]["kind"], "count");
        assert_eq!(json["end"]["value"], 3);
        assert_eq!(rule.count(), Some(3));
        assert_eq!(rule.end_date(), None);
    }
}
