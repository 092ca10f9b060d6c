//! Shared identifiers, currency codes, and calendar helpers.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns `true` until the store has assigned a key.
            pub fn is_unassigned(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

entity_id!(
    /// Primary key of an [`Account`](crate::Account).
    AccountId,
    "account"
);
entity_id!(
    /// Primary key of a [`Category`](crate::Category).
    CategoryId,
    "category"
);
entity_id!(
    /// Primary key of a [`Transaction`](crate::Transaction). Assigned in insertion order.
    TransactionId,
    "transaction"
);
entity_id!(BudgetId, "budget");
entity_id!(PlannedTransactionId, "planned");

/// Identifies the owner of every ledger entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Entities scoped to a single user.
pub trait Owned {
    fn owner(&self) -> UserId;

    fn is_owned_by(&self, user: UserId) -> bool {
        self.owner() == user
    }
}

/// Half-open `[start, end)` window over calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateWindowError {
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for DateWindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateWindowError::InvalidRange { start, end } => {
                write!(f, "window end {} precedes start {}", end, start)
            }
        }
    }
}

impl std::error::Error for DateWindowError {}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateWindowError> {
        if end < start {
            return Err(DateWindowError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Builds the window for a caller-supplied inclusive last day.
    pub fn from_inclusive(start: NaiveDate, last_day: NaiveDate) -> Result<Self, DateWindowError> {
        if last_day < start {
            return Err(DateWindowError::InvalidRange {
                start,
                end: last_day,
            });
        }
        Ok(Self {
            start,
            end: last_day + Duration::days(1),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn contains_instant(&self, at: DateTime<Utc>) -> bool {
        self.contains(at.date_naive())
    }

    /// Last day covered by the window, as users enter it.
    pub fn last_day(&self) -> NaiveDate {
        self.end - Duration::days(1)
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        start_of_day(self.start)
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        start_of_day(self.end)
    }
}

/// Midnight UTC at the beginning of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc)
}

/// Shifts a date by whole calendar months, clamping to the last day of the target month.
pub fn shift_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

pub fn shift_years(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    shift_months(date, years.checked_mul(12)?)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn inclusive_window_covers_last_day() {
        let window = DateWindow::from_inclusive(date(2024, 1, 1), date(2024, 1, 31))
            .expect("valid window");
        assert_eq!(window.end, date(2024, 2, 1));
        assert!(window.contains(date(2024, 1, 31)));
        assert!(!window.contains(date(2024, 2, 1)));
        assert_eq!(window.last_day(), date(2024, 1, 31));
    }

    #[test]
    fn window_rejects_inverted_range() {
        let err = DateWindow::new(date(2024, 2, 1), date(2024, 1, 1)).expect_err("inverted");
        assert!(matches!(err, DateWindowError::InvalidRange { .. }));
    }

    #[test]
    fn month_shift_clamps_to_month_end() {
        assert_eq!(shift_months(date(2024, 1, 31), 1), Some(date(2024, 2, 29)));
        assert_eq!(shift_months(date(2023, 1, 31), 1), Some(date(2023, 2, 28)));
        assert_eq!(shift_years(date(2024, 2, 29), 1), Some(date(2025, 2, 28)));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 12), 31);
    }

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(CurrencyCode::new(" eur ").as_str(), "EUR");
        assert_eq!(CurrencyCode::from("usd"), CurrencyCode::default());
    }
}
