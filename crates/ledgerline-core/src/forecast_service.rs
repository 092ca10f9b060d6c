//! Balance forecasting from current balances plus planned occurrences.

use chrono::{DateTime, Duration, Months, Utc};
use ledgerline_domain::{
    Account, AccountId, CurrencyCode, Occurrence, PlannedTransaction, UserId,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    currency::CurrencyConverter, recurrence::RecurrenceExpander, store::LedgerStore, CoreError,
    CoreResult,
};

/// Which accounts and planned transactions a forecast covers.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastScope {
    /// Explicit accounts; empty means every live account shown in reports.
    pub account_ids: Vec<AccountId>,
    pub base_currency: CurrencyCode,
    pub include_inactive: bool,
}

impl ForecastScope {
    pub fn new(base_currency: CurrencyCode) -> Self {
        Self {
            account_ids: Vec::new(),
            base_currency,
            include_inactive: false,
        }
    }

    pub fn with_accounts(mut self, accounts: impl IntoIterator<Item = AccountId>) -> Self {
        self.account_ids = accounts.into_iter().collect();
        self
    }

    pub fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountProjection {
    pub account_id: AccountId,
    pub name: String,
    pub currency: CurrencyCode,
    pub current_balance: Decimal,
    pub current_balance_base: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FutureBalance {
    pub target_date: DateTime<Utc>,
    pub base_currency: CurrencyCode,
    pub current_balance: Decimal,
    pub planned_income: Decimal,
    pub planned_expenses: Decimal,
    pub projected_balance: Decimal,
    pub income_count: usize,
    pub expense_count: usize,
    pub accounts: Vec<AccountProjection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionStep {
    Daily,
    Weekly,
    /// Calendar months.
    Monthly,
}

impl ProjectionStep {
    fn next(self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ProjectionStep::Daily => from.checked_add_signed(Duration::days(1)),
            ProjectionStep::Weekly => from.checked_add_signed(Duration::weeks(1)),
            ProjectionStep::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

/// One bucket of a projection. Occurrences on `period_end` belong to the next
/// bucket, except in the final bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionPoint {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub income: Decimal,
    pub expenses: Decimal,
    /// Running balance at the end of the bucket.
    pub balance: Decimal,
}

pub struct ForecastService;

impl ForecastService {
    /// Projected total balance on `target_date`.
    pub fn future_balance<S: LedgerStore>(
        store: &S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        now: DateTime<Utc>,
        target_date: DateTime<Utc>,
        scope: &ForecastScope,
    ) -> CoreResult<FutureBalance> {
        let accounts = select_accounts(store, user, scope)?;
        let base = &scope.base_currency;

        let mut rows = Vec::with_capacity(accounts.len());
        let mut current_balance = Decimal::ZERO;
        for account in &accounts {
            let converted = fx.convert(account.balance, &account.currency, base, now.date_naive())?;
            current_balance += converted;
            rows.push(AccountProjection {
                account_id: account.id,
                name: account.name.clone(),
                currency: account.currency.clone(),
                current_balance: account.balance,
                current_balance_base: converted,
            });
        }

        let mut planned_income = Decimal::ZERO;
        let mut planned_expenses = Decimal::ZERO;
        let mut income_count = 0usize;
        let mut expense_count = 0usize;
        for planned in pending_planned(store, user, scope)?
            .iter()
            .filter(|planned| planned.planned_date <= target_date)
        {
            for occurrence in RecurrenceExpander::generate_occurrences(planned, now, target_date) {
                let amount = convert_occurrence(fx, &occurrence, base)?;
                if occurrence.is_income {
                    planned_income += amount;
                    income_count += 1;
                } else {
                    planned_expenses += amount;
                    expense_count += 1;
                }
            }
        }

        let projected_balance = current_balance + planned_income - planned_expenses;
        debug!(%user, %projected_balance, income_count, expense_count, "future balance computed");
        Ok(FutureBalance {
            target_date,
            base_currency: base.clone(),
            current_balance,
            planned_income,
            planned_expenses,
            projected_balance,
            income_count,
            expense_count,
            accounts: rows,
        })
    }

    /// Running balance from `start` to `end` in buckets of `step`.
    pub fn balance_projection<S: LedgerStore>(
        store: &S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: ProjectionStep,
        scope: &ForecastScope,
    ) -> CoreResult<Vec<ProjectionPoint>> {
        if end < start {
            return Err(CoreError::Validation(
                "projection end precedes its start".into(),
            ));
        }
        let accounts = select_accounts(store, user, scope)?;
        let base = &scope.base_currency;
        let mut running = Decimal::ZERO;
        for account in &accounts {
            running += fx.convert(account.balance, &account.currency, base, start.date_naive())?;
        }
        let planned = pending_planned(store, user, scope)?;

        let mut points = Vec::new();
        let mut cursor = start;
        loop {
            let period_end = step.next(cursor).map_or(end, |next| next.min(end));
            let last = period_end >= end;
            let mut income = Decimal::ZERO;
            let mut expenses = Decimal::ZERO;
            for item in &planned {
                for occurrence in RecurrenceExpander::generate_occurrences(item, cursor, period_end)
                    .into_iter()
                    .filter(|occurrence| last || occurrence.occurrence_date < period_end)
                {
                    let amount = convert_occurrence(fx, &occurrence, base)?;
                    if occurrence.is_income {
                        income += amount;
                    } else {
                        expenses += amount;
                    }
                }
            }
            running += income - expenses;
            points.push(ProjectionPoint {
                period_start: cursor,
                period_end,
                income,
                expenses,
                balance: running,
            });
            if last {
                break;
            }
            cursor = period_end;
        }
        Ok(points)
    }
}

fn select_accounts<S: LedgerStore>(
    store: &S,
    user: UserId,
    scope: &ForecastScope,
) -> CoreResult<Vec<Account>> {
    let accounts: Vec<Account> = store
        .accounts_for_user(user)?
        .into_iter()
        .filter(Account::is_live)
        .filter(|account| {
            if scope.account_ids.is_empty() {
                account.show_in_reports
            } else {
                scope.account_ids.contains(&account.id)
            }
        })
        .collect();
    if accounts.is_empty() {
        return Err(CoreError::NotFound("no accounts selected for the forecast".into()));
    }
    Ok(accounts)
}

fn pending_planned<S: LedgerStore>(
    store: &S,
    user: UserId,
    scope: &ForecastScope,
) -> CoreResult<Vec<PlannedTransaction>> {
    Ok(store
        .planned_for_user(user)?
        .into_iter()
        .filter(|planned| planned.is_live() && !planned.is_executed)
        .filter(|planned| scope.include_inactive || planned.is_active)
        .filter(|planned| {
            scope.account_ids.is_empty()
                || planned
                    .account_id
                    .map_or(false, |account| scope.account_ids.contains(&account))
        })
        .collect())
}

fn convert_occurrence(
    fx: &dyn CurrencyConverter,
    occurrence: &Occurrence,
    base: &CurrencyCode,
) -> CoreResult<Decimal> {
    fx.convert(
        occurrence.amount,
        &occurrence.currency,
        base,
        occurrence.occurrence_date.date_naive(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        currency::{FxBook, FxRate},
        memory::InMemoryStore,
        planned_service::PlannedTransactionService,
    };
    use chrono::{NaiveDate, TimeZone};
    use ledgerline_domain::{PlannedTransactionDraft, RecurrenceRule};
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD")
    }

    fn seeded() -> (InMemoryStore, UserId, Account, Account) {
        let mut store = InMemoryStore::new();
        let user = UserId::new();
        let checking = store
            .insert_account(Account::new(user, "Checking", usd(), dec!(1000)))
            .expect("checking");
        let savings = store
            .insert_account(
                Account::new(user, "Euro savings", CurrencyCode::new("EUR"), dec!(100))
                    .hidden_from_reports(),
            )
            .expect("savings");
        (store, user, checking, savings)
    }

    #[test]
    fn future_balance_adds_planned_occurrences_up_to_target() {
        let (mut store, user, checking, _) = seeded();
        PlannedTransactionService::create(
            &mut store,
            user,
            PlannedTransactionDraft::new(dec!(500), usd(), true, at(2024, 2, 1))
                .recurring(RecurrenceRule::monthly())
                .for_account(checking.id)
                .with_label("Salary"),
        )
        .expect("salary");
        PlannedTransactionService::create(
            &mut store,
            user,
            PlannedTransactionDraft::new(dec!(200), usd(), false, at(2024, 2, 15))
                .for_account(checking.id),
        )
        .expect("insurance");
        PlannedTransactionService::create(
            &mut store,
            user,
            PlannedTransactionDraft::new(dec!(999), usd(), false, at(2024, 6, 1))
                .for_account(checking.id),
        )
        .expect("beyond target");

        let forecast = ForecastService::future_balance(
            &store,
            &FxBook::new(),
            user,
            at(2024, 1, 15),
            at(2024, 3, 31),
            &ForecastScope::new(usd()),
        )
        .expect("forecast");

        assert_eq!(forecast.accounts.len(), 1);
        assert_eq!(forecast.current_balance, dec!(1000));
        assert_eq!(forecast.planned_income, dec!(1000));
        assert_eq!(forecast.income_count, 2);
        assert_eq!(forecast.planned_expenses, dec!(200));
        assert_eq!(forecast.expense_count, 1);
        assert_eq!(forecast.projected_balance, dec!(1800));
    }

    #[test]
    fn explicit_accounts_are_converted_to_the_base_currency() {
        let (store, user, checking, savings) = seeded();
        let fx = FxBook::from_rates([FxRate::new(
            "EUR",
            "USD",
            NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"),
            dec!(1.1),
        )]);
        let scope = ForecastScope::new(usd()).with_accounts([checking.id, savings.id]);
        let forecast =
            ForecastService::future_balance(&store, &fx, user, at(2024, 1, 15), at(2024, 2, 1), &scope)
                .expect("forecast");
        assert_eq!(forecast.current_balance, dec!(1110.0));
        assert_eq!(forecast.projected_balance, forecast.current_balance);
    }

    #[test]
    fn forecast_without_accounts_is_not_found() {
        let store = InMemoryStore::new();
        let err = ForecastService::future_balance(
            &store,
            &FxBook::new(),
            UserId::new(),
            at(2024, 1, 1),
            at(2024, 2, 1),
            &ForecastScope::new(usd()),
        )
        .expect_err("no accounts");
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn projection_buckets_do_not_double_count_boundaries() {
        let (mut store, user, checking, _) = seeded();
        PlannedTransactionService::create(
            &mut store,
            user,
            PlannedTransactionDraft::new(dec!(10), usd(), false, at(2024, 1, 8))
                .recurring(RecurrenceRule::weekly())
                .for_account(checking.id),
        )
        .expect("weekly");

        let points = ForecastService::balance_projection(
            &store,
            &FxBook::new(),
            user,
            at(2024, 1, 1),
            at(2024, 1, 22),
            ProjectionStep::Weekly,
            &ForecastScope::new(usd()),
        )
        .expect("projection");

        let expenses: Vec<Decimal> = points.iter().map(|p| p.expenses).collect();
        assert_eq!(expenses, vec![dec!(0), dec!(10), dec!(20)]);
        let balances: Vec<Decimal> = points.iter().map(|p| p.balance).collect();
        assert_eq!(balances, vec![dec!(1000), dec!(990), dec!(970)]);
        assert_eq!(points[0].period_end, points[1].period_start);
        assert_eq!(points[2].period_end, at(2024, 1, 22));
    }

    #[test]
    fn inverted_projection_range_is_rejected() {
        let (store, user, _, _) = seeded();
        let err = ForecastService::balance_projection(
            &store,
            &FxBook::new(),
            user,
            at(2024, 2, 1),
            at(2024, 1, 1),
            ProjectionStep::Monthly,
            &ForecastScope::new(usd()),
        )
        .expect_err("inverted");
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
