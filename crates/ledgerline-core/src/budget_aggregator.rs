//! Keeps each budget's collected amount in step with posted expenses.
//!
//! Creating or editing a budget runs a full rescan of its window. A new
//! expense is added to the active budgets it falls into; editing or deleting
//! one rescans the budgets it touched. The sweep archives budgets whose window
//! has closed and rolls repeating ones into their next period.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use ledgerline_domain::{
    Budget, BudgetDraft, BudgetId, BudgetPeriod, CategoryId, CategorySet, CurrencyCode,
    DateWindow, Transaction, UserId,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{currency::CurrencyConverter, store::LedgerStore, CoreError, CoreResult};

const SUCCESSOR_SUFFIX: &str = " (copy)";

/// A budget that could not take part in an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetFailure {
    pub budget_id: BudgetId,
    pub reason: String,
}

/// Which budgets an incremental posting reached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetPostingReport {
    pub applied: Vec<BudgetId>,
    pub failed: Vec<BudgetFailure>,
}

impl BudgetPostingReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub archived: Vec<BudgetId>,
    pub created: Vec<BudgetId>,
    pub failed: Vec<BudgetFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BudgetFilter {
    #[default]
    All,
    Active,
    Archived,
}

/// Caller-facing view of a budget. `end_date` is the inclusive last day.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSummary {
    pub id: BudgetId,
    pub name: String,
    pub currency: CurrencyCode,
    pub target_amount: Decimal,
    pub collected_amount: Decimal,
    pub remaining: Decimal,
    pub period: BudgetPeriod,
    pub repeat: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub categories: Vec<CategoryId>,
    pub comment: Option<String>,
    pub is_archived: bool,
}

impl From<&Budget> for BudgetSummary {
    fn from(budget: &Budget) -> Self {
        Self {
            id: budget.id,
            name: budget.name.clone(),
            currency: budget.currency.clone(),
            target_amount: budget.target_amount,
            collected_amount: budget.collected_amount,
            remaining: budget.remaining(),
            period: budget.period,
            repeat: budget.repeat,
            start_date: budget.start_date,
            end_date: budget.inclusive_end(),
            categories: budget.included_categories.ids().collect(),
            comment: budget.comment.clone(),
            is_archived: budget.is_archived,
        }
    }
}

pub struct BudgetAggregator;

impl BudgetAggregator {
    pub fn create<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        draft: BudgetDraft,
    ) -> CoreResult<Budget> {
        let window = validate_draft(&draft)?;
        let budget = store.atomically(|store| {
            let included = Self::resolve_categories(store, user, &draft.categories)?;
            let mut budget = store.insert_budget(Budget {
                id: BudgetId::default(),
                user_id: user,
                name: draft.name.trim().to_string(),
                currency: draft.currency.clone(),
                target_amount: draft.target_amount,
                collected_amount: Decimal::ZERO,
                period: draft.period,
                repeat: draft.repeat,
                start_date: window.start,
                end_date: window.end,
                included_categories: included,
                comment: draft.comment.clone(),
                is_archived: false,
                is_deleted: false,
                created_at: Utc::now(),
            })?;
            budget.collected_amount = Self::collected_for(store, fx, &budget)?;
            store.save_budget(&budget)?;
            Ok(budget)
        })?;
        info!(budget = %budget.id, collected = %budget.collected_amount, "budget created");
        Ok(budget)
    }

    /// Replaces the definition of budget `id` and recomputes it from scratch.
    pub fn update<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        id: BudgetId,
        draft: BudgetDraft,
    ) -> CoreResult<Budget> {
        let window = validate_draft(&draft)?;
        let budget = store.atomically(|store| {
            let mut budget = Self::owned_budget(store, user, id)?;
            budget.name = draft.name.trim().to_string();
            budget.currency = draft.currency.clone();
            budget.target_amount = draft.target_amount;
            budget.period = draft.period;
            budget.repeat = draft.repeat;
            budget.start_date = window.start;
            budget.end_date = window.end;
            budget.included_categories = Self::resolve_categories(store, user, &draft.categories)?;
            budget.comment = draft.comment.clone();
            budget.collected_amount = Self::collected_for(store, fx, &budget)?;
            store.save_budget(&budget)?;
            Ok(budget)
        })?;
        info!(budget = %budget.id, collected = %budget.collected_amount, "budget updated");
        Ok(budget)
    }

    pub fn create_or_update<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        id: Option<BudgetId>,
        draft: BudgetDraft,
    ) -> CoreResult<Budget> {
        match id {
            Some(id) => Self::update(store, fx, user, id, draft),
            None => Self::create(store, fx, user, draft),
        }
    }

    /// Adds a freshly posted expense to every active budget it falls into.
    pub fn on_transaction_posted<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        transaction: &Transaction,
    ) -> CoreResult<BudgetPostingReport> {
        Self::post(store, fx, transaction)
    }

    /// Rescans the budgets that counted a transaction which has since been deleted.
    ///
    /// A rescan rather than a subtraction: the original posting may have
    /// failed for some budget, and then there is nothing to take back out.
    pub fn on_transaction_reversed<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        before: &Transaction,
    ) -> CoreResult<BudgetPostingReport> {
        Self::refresh(store, fx, &[before])
    }

    /// Rescans the budgets touched by either the old or the new state of an edited transaction.
    pub fn on_transaction_replaced<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        before: &Transaction,
        after: &Transaction,
    ) -> CoreResult<BudgetPostingReport> {
        Self::refresh(store, fx, &[before, after])
    }

    /// Recomputes one budget from its window.
    pub fn rescan<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
        id: BudgetId,
    ) -> CoreResult<Budget> {
        store.atomically(|store| {
            let mut budget = Self::owned_budget(store, user, id)?;
            budget.collected_amount = Self::collected_for(store, fx, &budget)?;
            store.save_budget(&budget)?;
            debug!(budget = %id, collected = %budget.collected_amount, "budget rescanned");
            Ok(budget)
        })
    }

    /// Recomputes every live budget of `user`.
    pub fn rescan_user<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        user: UserId,
    ) -> CoreResult<Vec<Budget>> {
        let budgets = store.atomically(|store| {
            let mut refreshed = Vec::new();
            for mut budget in store.budgets_for_user(user)? {
                if budget.is_deleted {
                    continue;
                }
                budget.collected_amount = Self::collected_for(store, fx, &budget)?;
                store.save_budget(&budget)?;
                refreshed.push(budget);
            }
            Ok(refreshed)
        })?;
        info!(%user, budgets = budgets.len(), "budgets rescanned");
        Ok(budgets)
    }

    /// Archives every budget whose window closed before `now`.
    ///
    /// Repeating budgets get a successor covering the next period. Each budget
    /// is rolled over in its own storage transaction; a failure leaves that
    /// budget unarchived for the next sweep and does not stop the others.
    pub fn sweep_outdated<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        now: DateTime<Utc>,
    ) -> CoreResult<SweepReport> {
        let due: Vec<Budget> = store
            .all_budgets()?
            .into_iter()
            .filter(|budget| budget.is_active() && budget.is_outdated(now))
            .collect();

        let mut report = SweepReport::default();
        for budget in due {
            match store.atomically(|store| Self::roll_over(store, fx, &budget)) {
                Ok(successor) => {
                    report.archived.push(budget.id);
                    report.created.extend(successor);
                }
                Err(err) => {
                    warn!(budget = %budget.id, error = %err, "budget rollover failed");
                    report.failed.push(BudgetFailure {
                        budget_id: budget.id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(
            archived = report.archived.len(),
            created = report.created.len(),
            failed = report.failed.len(),
            "outdated budgets swept"
        );
        Ok(report)
    }

    pub fn archive<S: LedgerStore>(store: &mut S, user: UserId, id: BudgetId) -> CoreResult<Budget> {
        store.atomically(|store| {
            let mut budget = Self::owned_budget(store, user, id)?;
            budget.is_archived = true;
            store.save_budget(&budget)?;
            info!(budget = %id, "budget archived");
            Ok(budget)
        })
    }

    /// Soft-deletes a budget.
    pub fn delete<S: LedgerStore>(store: &mut S, user: UserId, id: BudgetId) -> CoreResult<Budget> {
        store.atomically(|store| {
            let mut budget = Self::owned_budget(store, user, id)?;
            budget.is_deleted = true;
            store.save_budget(&budget)?;
            info!(budget = %id, "budget deleted");
            Ok(budget)
        })
    }

    pub fn list<S: LedgerStore>(
        store: &S,
        user: UserId,
        filter: BudgetFilter,
    ) -> CoreResult<Vec<BudgetSummary>> {
        let mut budgets: Vec<Budget> = store
            .budgets_for_user(user)?
            .into_iter()
            .filter(|budget| !budget.is_deleted)
            .filter(|budget| match filter {
                BudgetFilter::All => true,
                BudgetFilter::Active => !budget.is_archived,
                BudgetFilter::Archived => budget.is_archived,
            })
            .collect();
        budgets.sort_by_key(|budget| (budget.start_date, budget.id));
        Ok(budgets.iter().map(BudgetSummary::from).collect())
    }

    /// Sum of every matching expense in the budget's window, in the budget's currency.
    pub fn collected_for<S: LedgerStore>(
        store: &S,
        fx: &dyn CurrencyConverter,
        budget: &Budget,
    ) -> CoreResult<Decimal> {
        let window = budget.window();
        let mut total = Decimal::ZERO;
        for txn in store
            .live_transactions_between(budget.user_id, window.start_instant(), window.end_instant())?
            .iter()
            .filter(|txn| budget.matches(txn))
        {
            total += fx.convert(
                txn.amount,
                &txn.currency,
                &budget.currency,
                txn.date_time.date_naive(),
            )?;
        }
        Ok(total)
    }

    fn refresh<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        touched: &[&Transaction],
    ) -> CoreResult<BudgetPostingReport> {
        let mut report = BudgetPostingReport::default();
        let owners: BTreeSet<UserId> = touched.iter().map(|txn| txn.user_id).collect();
        for owner in owners {
            for mut budget in store.budgets_for_user(owner)? {
                if !budget.is_active() || !touched.iter().any(|txn| budget.matches(txn)) {
                    continue;
                }
                match Self::collected_for(store, fx, &budget) {
                    Ok(collected) => {
                        budget.collected_amount = collected;
                        store.save_budget(&budget)?;
                        report.applied.push(budget.id);
                    }
                    Err(err) => {
                        warn!(budget = %budget.id, error = %err, "budget rescan skipped");
                        report.failed.push(BudgetFailure {
                            budget_id: budget.id,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
        Ok(report)
    }

    fn post<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        transaction: &Transaction,
    ) -> CoreResult<BudgetPostingReport> {
        let mut report = BudgetPostingReport::default();
        if !transaction.counts_toward_budgets() {
            return Ok(report);
        }
        for mut budget in store.budgets_for_user(transaction.user_id)? {
            if !budget.is_active() || !budget.matches(transaction) {
                continue;
            }
            match fx.convert(
                transaction.amount,
                &transaction.currency,
                &budget.currency,
                transaction.date_time.date_naive(),
            ) {
                Ok(converted) => {
                    budget.collected_amount += converted;
                    store.save_budget(&budget)?;
                    report.applied.push(budget.id);
                }
                Err(err) => {
                    warn!(
                        budget = %budget.id,
                        transaction = %transaction.id,
                        error = %err,
                        "budget posting skipped"
                    );
                    report.failed.push(BudgetFailure {
                        budget_id: budget.id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn roll_over<S: LedgerStore>(
        store: &mut S,
        fx: &dyn CurrencyConverter,
        budget: &Budget,
    ) -> CoreResult<Option<BudgetId>> {
        let successor = if budget.repeat {
            let start = budget.end_date;
            let end = budget.period.advance(start).ok_or_else(|| {
                CoreError::InvalidPeriod(format!("{} budgets cannot repeat", budget.period))
            })?;
            let mut next = store.insert_budget(Budget {
                id: BudgetId::default(),
                name: successor_name(&budget.name),
                collected_amount: Decimal::ZERO,
                start_date: start,
                end_date: end,
                is_archived: false,
                is_deleted: false,
                created_at: Utc::now(),
                ..budget.clone()
            })?;
            next.collected_amount = Self::collected_for(store, fx, &next)?;
            store.save_budget(&next)?;
            debug!(budget = %budget.id, successor = %next.id, "budget rolled over");
            Some(next.id)
        } else {
            None
        };

        let mut archived = budget.clone();
        archived.is_archived = true;
        store.save_budget(&archived)?;
        Ok(successor)
    }

    fn owned_budget<S: LedgerStore>(store: &S, user: UserId, id: BudgetId) -> CoreResult<Budget> {
        store
            .budget(id)?
            .filter(|budget| !budget.is_deleted && budget.user_id == user)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    /// Keeps only ids of the owner's live categories. A filter left with no
    /// ids at all is rejected instead of widening to every category.
    fn resolve_categories<S: LedgerStore>(
        store: &S,
        user: UserId,
        requested: &[CategoryId],
    ) -> CoreResult<CategorySet> {
        if requested.is_empty() {
            return Ok(CategorySet::all());
        }
        let owned: BTreeSet<CategoryId> = store
            .categories_for_user(user)?
            .into_iter()
            .filter(|category| category.is_live())
            .map(|category| category.id)
            .collect();
        let (kept, dropped): (Vec<CategoryId>, Vec<CategoryId>) =
            requested.iter().copied().partition(|id| owned.contains(id));
        if kept.is_empty() {
            return Err(CoreError::InvalidCategory(format!(
                "none of {:?} belongs to the budget owner",
                dropped
            )));
        }
        if !dropped.is_empty() {
            debug!(?dropped, "ignoring categories outside the budget owner's ledger");
        }
        Ok(kept.into_iter().collect())
    }
}

fn validate_draft(draft: &BudgetDraft) -> CoreResult<DateWindow> {
    if draft.name.trim().is_empty() {
        return Err(CoreError::Validation("budget name is required".into()));
    }
    if draft.target_amount < Decimal::ZERO {
        return Err(CoreError::Validation(
            "budget target must not be negative".into(),
        ));
    }
    if draft.period == BudgetPeriod::Custom && draft.repeat {
        return Err(CoreError::InvalidPeriod(
            "custom budgets cannot repeat".into(),
        ));
    }
    DateWindow::from_inclusive(draft.start_date, draft.end_date)
        .map_err(|err| CoreError::InvalidPeriod(err.to_string()))
}

fn successor_name(name: &str) -> String {
    if name.ends_with(SUCCESSOR_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, SUCCESSOR_SUFFIX)
    }
}
