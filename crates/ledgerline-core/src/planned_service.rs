//! Planned (future or recurring) transactions.

use chrono::{DateTime, Duration, Utc};
use ledgerline_domain::{
    Frequency, Occurrence, PlannedTransaction, PlannedTransactionDraft, PlannedTransactionId, RecurrenceEnd,
    RecurrenceRule, UserId,
};
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    access::{ensure_owner, owned_account},
    recurrence::RecurrenceExpander,
    store::LedgerStore,
    CoreError, CoreResult,
};

/// How far back `upcoming` reaches for overdue items.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlannedFilter {
    pub include_inactive: bool,
    pub include_executed: bool,
}

pub struct PlannedTransactionService;

impl PlannedTransactionService {
    pub fn create<S: LedgerStore>(
        store: &mut S,
        user: UserId,
        draft: PlannedTransactionDraft,
    ) -> CoreResult<PlannedTransaction> {
        validate_draft(&draft)?;
        let planned = store.atomically(|store| {
            if let Some(account) = draft.account_id {
                owned_account(store, account, user)?;
            }
            store.insert_planned(PlannedTransaction {
                id: PlannedTransactionId::default(),
                user_id: user,
                account_id: draft.account_id,
                label: draft.label.clone(),
                notes: draft.notes.clone(),
                amount: draft.amount,
                currency: draft.currency.clone(),
                is_income: draft.is_income,
                planned_date: draft.planned_date,
                is_recurring: draft.recurrence_rule.is_some(),
                recurrence_rule: draft.recurrence_rule,
                is_executed: false,
                is_active: draft.is_active,
                is_deleted: false,
                created_at: Utc::now(),
            })
        })?;
        info!(planned = %planned.id, recurring = planned.is_recurring, "planned transaction created");
        Ok(planned)
    }

    pub fn update<S: LedgerStore>(
        store: &mut S,
        user: UserId,
        id: PlannedTransactionId,
        draft: PlannedTransactionDraft,
    ) -> CoreResult<PlannedTransaction> {
        validate_draft(&draft)?;
        store.atomically(|store| {
            let mut planned = Self::get(store, user, id)?;
            if let Some(account) = draft.account_id {
                owned_account(store, account, user)?;
            }
            planned.account_id = draft.account_id;
            planned.label = draft.label.clone();
            planned.notes = draft.notes.clone();
            planned.amount = draft.amount;
            planned.currency = draft.currency.clone();
            planned.is_income = draft.is_income;
            planned.planned_date = draft.planned_date;
            planned.is_recurring = draft.recurrence_rule.is_some();
            planned.recurrence_rule = draft.recurrence_rule;
            planned.is_active = draft.is_active;
            store.save_planned(&planned)?;
            info!(planned = %id, "planned transaction updated");
            Ok(planned)
        })
    }

    pub fn set_active<S: LedgerStore>(
        store: &mut S,
        user: UserId,
        id: PlannedTransactionId,
        active: bool,
    ) -> CoreResult<PlannedTransaction> {
        Self::modify(store, user, id, |planned| planned.is_active = active)
    }

    pub fn mark_executed<S: LedgerStore>(
        store: &mut S,
        user: UserId,
        id: PlannedTransactionId,
    ) -> CoreResult<PlannedTransaction> {
        Self::modify(store, user, id, |planned| planned.is_executed = true)
    }

    /// Soft-deletes and deactivates.
    pub fn delete<S: LedgerStore>(
        store: &mut S,
        user: UserId,
        id: PlannedTransactionId,
    ) -> CoreResult<PlannedTransaction> {
        let planned = Self::modify(store, user, id, |planned| {
            planned.is_deleted = true;
            planned.is_active = false;
        })?;
        info!(planned = %id, "planned transaction deleted");
        Ok(planned)
    }

    pub fn get<S: LedgerStore>(
        store: &S,
        user: UserId,
        id: PlannedTransactionId,
    ) -> CoreResult<PlannedTransaction> {
        let planned = store
            .planned(id)?
            .filter(PlannedTransaction::is_live)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        ensure_owner(&planned, user, &id.to_string())?;
        Ok(planned)
    }

    /// Live planned transactions of `user` ordered by planned date.
    pub fn list<S: LedgerStore>(
        store: &S,
        user: UserId,
        filter: PlannedFilter,
    ) -> CoreResult<Vec<PlannedTransaction>> {
        let mut rows: Vec<PlannedTransaction> = store
            .planned_for_user(user)?
            .into_iter()
            .filter(|planned| planned.is_live())
            .filter(|planned| filter.include_inactive || planned.is_active)
            .filter(|planned| filter.include_executed || !planned.is_executed)
            .collect();
        rows.sort_by_key(|planned| (planned.planned_date, planned.id));
        Ok(rows)
    }

    /// Occurrences of every pending planned transaction up to `end`, sorted by date.
    ///
    /// Items whose planned date fell within the last `lookback_days` are
    /// expanded from that date so overdue occurrences are listed too.
    pub fn upcoming<S: LedgerStore>(
        store: &S,
        user: UserId,
        now: DateTime<Utc>,
        end: DateTime<Utc>,
        include_inactive: bool,
        lookback_days: i64,
    ) -> CoreResult<Vec<Occurrence>> {
        let lookback_start = now - Duration::days(lookback_days);
        let filter = PlannedFilter {
            include_inactive,
            include_executed: false,
        };
        let mut occurrences: Vec<Occurrence> = Self::list(store, user, filter)?
            .iter()
            .flat_map(|planned| {
                let start = if planned.planned_date < now && planned.planned_date > lookback_start {
                    planned.planned_date
                } else {
                    now
                };
                RecurrenceExpander::generate_occurrences(planned, start, end)
            })
            .collect();
        occurrences.sort_by_key(|occurrence| (occurrence.occurrence_date, occurrence.planned_transaction_id));
        Ok(occurrences)
    }

    fn modify<S: LedgerStore>(
        store: &mut S,
        user: UserId,
        id: PlannedTransactionId,
        change: impl FnOnce(&mut PlannedTransaction),
    ) -> CoreResult<PlannedTransaction> {
        store.atomically(|store| {
            let mut planned = Self::get(store, user, id)?;
            change(&mut planned);
            store.save_planned(&planned)?;
            Ok(planned)
        })
    }
}

fn validate_draft(draft: &PlannedTransactionDraft) -> CoreResult<()> {
    if draft.amount < Decimal::ZERO {
        return Err(CoreError::Validation("amount must not be negative".into()));
    }
    if let Some(rule) = draft.recurrence_rule.as_ref() {
        validate_rule(rule)?;
    }
    Ok(())
}

pub fn validate_rule(rule: &RecurrenceRule) -> CoreResult<()> {
    if rule.frequency == Frequency::Unsupported {
        return Err(CoreError::Validation("unsupported recurrence frequency".into()));
    }
    if rule.interval < 1 {
        return Err(CoreError::Validation("interval must be at least 1".into()));
    }
    if let RecurrenceEnd::Count(0) = rule.end {
        return Err(CoreError::Validation(
            "occurrence count must be at least 1".into(),
        ));
    }
    if rule.day_of_week.map_or(false, |day| day > 6) {
        return Err(CoreError::Validation(
            "day_of_week must be between 0 (Monday) and 6 (Sunday)".into(),
        ));
    }
    if rule
        .day_of_month
        .map_or(false, |day| !(1..=31).contains(&day))
    {
        return Err(CoreError::Validation(
            "day_of_month must be between 1 and 31".into(),
        ));
    }
    Ok(())
}
