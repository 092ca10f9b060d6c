//! Expansion of planned transactions into dated occurrences.

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use ledgerline_domain::{Frequency, Occurrence, PlannedTransaction, RecurrenceRule};

/// Upper bound on cursor advances per expansion, regardless of window size.
pub const MAX_EXPANSION_STEPS: usize = 1000;

/// Monthly rules never pin a day past the 28th so every month has the date.
pub const MAX_PINNED_DAY_OF_MONTH: u32 = 28;

pub struct RecurrenceExpander;

impl RecurrenceExpander {
    /// Lists the occurrences of `planned` dated within `[window_start, window_end]`.
    ///
    /// Pure: the same inputs always give the same ordered list.
    pub fn generate_occurrences(
        planned: &PlannedTransaction,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<Occurrence> {
        let Some(rule) = planned.rule() else {
            let date = planned.planned_date;
            return if date >= window_start && date <= window_end {
                vec![occurrence(planned, date)]
            } else {
                Vec::new()
            };
        };

        let interval = rule.interval.max(1);
        let limit = match rule.end_date() {
            Some(end) => end.min(window_end),
            None => window_end,
        };
        let max_count = rule.count();

        let mut out = Vec::new();
        let mut cursor = first_occurrence(planned.planned_date, rule);
        let mut steps = 0usize;
        while cursor <= limit && steps < MAX_EXPANSION_STEPS {
            if max_count.map_or(false, |count| steps >= count as usize) {
                break;
            }
            if cursor >= window_start {
                out.push(occurrence(planned, cursor));
            }
            steps += 1;
            match advance(cursor, rule, interval) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        out
    }
}

/// Monthly rules with a pinned day later in the planned month start on that day.
/// Expansion never starts before `planned_date`.
fn first_occurrence(planned_date: DateTime<Utc>, rule: &RecurrenceRule) -> DateTime<Utc> {
    match (rule.frequency, pinned_day(rule)) {
        (Frequency::Monthly, Some(day)) => planned_date
            .with_day(day)
            .map_or(planned_date, |aligned| aligned.max(planned_date)),
        _ => planned_date,
    }
}

fn advance(cursor: DateTime<Utc>, rule: &RecurrenceRule, interval: u32) -> Option<DateTime<Utc>> {
    match rule.frequency {
        Frequency::Daily => cursor.checked_add_signed(Duration::days(i64::from(interval))),
        Frequency::Weekly => cursor.checked_add_signed(Duration::weeks(i64::from(interval))),
        Frequency::Monthly => {
            let next = cursor.checked_add_months(Months::new(interval))?;
            match pinned_day(rule) {
                Some(day) => next.with_day(day),
                None => Some(next),
            }
        }
        Frequency::Yearly => cursor.checked_add_months(Months::new(interval.checked_mul(12)?)),
        Frequency::Unsupported => None,
    }
}

fn pinned_day(rule: &RecurrenceRule) -> Option<u32> {
    rule.day_of_month
        .map(|day| u32::from(day).clamp(1, MAX_PINNED_DAY_OF_MONTH))
}

fn occurrence(planned: &PlannedTransaction, date: DateTime<Utc>) -> Occurrence {
    Occurrence {
        planned_transaction_id: planned.id,
        occurrence_date: date,
        amount: planned.amount,
        currency: planned.currency.clone(),
        is_income: planned.is_income,
        label: planned.label.clone(),
        is_active: planned.is_active,
    }
}
