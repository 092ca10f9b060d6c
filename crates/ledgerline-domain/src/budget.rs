//! Spending budgets over a half-open date window.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;

/// Enumerates canonical budgeting cadences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
    Custom,
}

impl BudgetPeriod {
    /// Start of the period following one that started at `start`.
    ///
    /// Custom periods have no successor.
    pub fn advance(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            BudgetPeriod::Daily => start.checked_add_signed(Duration::days(1)),
            BudgetPeriod::Weekly => start.checked_add_signed(Duration::weeks(1)),
            BudgetPeriod::Monthly => shift_months(start, 1),
            BudgetPeriod::Yearly => shift_years(start, 1),
            BudgetPeriod::Custom => None,
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetPeriod::Daily => "daily",
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
            BudgetPeriod::Custom => "custom",
        };
        f.write_str(label)
    }
}

/// Category filter of a budget. Empty means every category.
///
/// Persisted as a comma separated id list, e.g. `"3,7,12"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySet(BTreeSet<CategoryId>);

impl CategorySet {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn includes(&self, category: Option<CategoryId>) -> bool {
        if self.0.is_empty() {
            return true;
        }
        category.map_or(false, |id| self.0.contains(&id))
    }

    pub fn ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|id| id.0.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses the stored list, skipping blank or malformed entries.
    pub fn decode(raw: &str) -> Self {
        raw.split(',')
            .filter_map(|part| part.trim().parse::<u64>().ok())
            .map(CategoryId)
            .collect()
    }
}

impl FromIterator<CategoryId> for CategorySet {
    fn from_iter<I: IntoIterator<Item = CategoryId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for CategorySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for CategorySet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|value| Self::decode(&value)).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: BudgetId,
    pub user_id: UserId,
    pub name: String,
    pub currency: CurrencyCode,
    pub target_amount: Decimal,
    #[serde(default)]
    pub collected_amount: Decimal,
    pub period: BudgetPeriod,
    #[serde(default)]
    pub repeat: bool,
    /// First day covered.
    pub start_date: NaiveDate,
    /// Exclusive end: the caller's last day plus one.
    pub end_date: NaiveDate,
    #[serde(default)]
    pub included_categories: CategorySet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn window(&self) -> DateWindow {
        DateWindow {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.window().contains_instant(at)
    }

    /// Active budgets receive incremental postings.
    pub fn is_active(&self) -> bool {
        !self.is_archived && !self.is_deleted
    }

    /// Whether the window closed strictly before `now`.
    pub fn is_outdated(&self, now: DateTime<Utc>) -> bool {
        start_of_day(self.end_date) < now
    }

    pub fn matches(&self, txn: &crate::Transaction) -> bool {
        txn.user_id == self.user_id
            && txn.counts_toward_budgets()
            && self.contains(txn.date_time)
            && self.included_categories.includes(txn.category_id)
    }

    pub fn remaining(&self) -> Decimal {
        self.target_amount - self.collected_amount
    }

    /// Last day as entered by the user.
    pub fn inclusive_end(&self) -> NaiveDate {
        self.window().last_day()
    }
}

impl Owned for Budget {
    fn owner(&self) -> UserId {
        self.user_id
    }
}

/// Caller input for creating or editing a budget. `end_date` is inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDraft {
    pub name: String,
    pub currency: CurrencyCode,
    pub target_amount: Decimal,
    pub period: BudgetPeriod,
    pub repeat: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub categories: Vec<CategoryId>,
    pub comment: Option<String>,
}

impl BudgetDraft {
    pub fn new(
        name: impl Into<String>,
        currency: CurrencyCode,
        target_amount: Decimal,
        period: BudgetPeriod,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            currency,
            target_amount,
            period,
            repeat: false,
            start_date,
            end_date,
            categories: Vec::new(),
            comment: None,
        }
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = CategoryId>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }
}
