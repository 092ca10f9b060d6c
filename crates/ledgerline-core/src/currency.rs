//! Currency conversion contract and a rate-table implementation.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use ledgerline_domain::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CoreError, CoreResult};

/// Converts amounts between currencies as of a given day.
pub trait CurrencyConverter {
    fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
        on: NaiveDate,
    ) -> CoreResult<Decimal>;
}

/// A quoted exchange rate: one unit of `from` buys `rate` units of `to`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FxRate {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub date: NaiveDate,
    pub rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl FxRate {
    pub fn new(from: &str, to: &str, date: NaiveDate, rate: Decimal) -> Self {
        Self {
            from: CurrencyCode::new(from),
            to: CurrencyCode::new(to),
            date,
            rate,
            source: None,
        }
    }
}

/// How many days back a quote may be reused when the exact day is missing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FxTolerance {
    pub days: i64,
}

impl Default for FxTolerance {
    fn default() -> Self {
        Self { days: 5 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FxLookup {
    pub rate: Decimal,
    pub date: NaiveDate,
    pub source: String,
}

/// In-memory rate table keyed by currency pair and quote date.
#[derive(Debug, Clone, Default)]
pub struct FxBook {
    rates: HashMap<(CurrencyCode, CurrencyCode), BTreeMap<NaiveDate, FxRate>>,
    pub tolerance: FxTolerance,
}

impl FxBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(days: i64) -> Self {
        Self {
            rates: HashMap::new(),
            tolerance: FxTolerance { days },
        }
    }

    pub fn from_rates(rates: impl IntoIterator<Item = FxRate>) -> Self {
        let mut book = Self::new();
        for rate in rates {
            book.add_rate(rate);
        }
        book
    }

    pub fn add_rate(&mut self, rate: FxRate) {
        let key = (rate.from.clone(), rate.to.clone());
        self.rates.entry(key).or_default().insert(rate.date, rate);
    }

    pub fn all_rates(&self) -> Vec<FxRate> {
        let mut out: Vec<FxRate> = self
            .rates
            .values()
            .flat_map(|series| series.values().cloned())
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.from.cmp(&b.from)));
        out
    }

    /// Finds the rate for `from -> to`, trying the direct pair, then the inverse pair.
    pub fn lookup_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> CoreResult<FxLookup> {
        if from == to {
            return Ok(FxLookup {
                rate: Decimal::ONE,
                date,
                source: "parity".into(),
            });
        }
        if let Some(series) = self.rates.get(&(from.clone(), to.clone())) {
            return self.lookup_within(series, from, to, date);
        }
        if let Some(series) = self.rates.get(&(to.clone(), from.clone())) {
            let lookup = self.lookup_within(series, to, from, date)?;
            if lookup.rate.is_zero() {
                return Err(conversion_error(from, to, "inverse of a zero rate"));
            }
            return Ok(FxLookup {
                rate: Decimal::ONE / lookup.rate,
                date: lookup.date,
                source: lookup.source,
            });
        }
        Err(conversion_error(from, to, "pair not quoted"))
    }

    fn lookup_within(
        &self,
        series: &BTreeMap<NaiveDate, FxRate>,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> CoreResult<FxLookup> {
        if let Some(rate) = series.get(&date) {
            return Ok(FxLookup {
                rate: rate.rate,
                date: rate.date,
                source: rate.source.clone().unwrap_or_else(|| "manual".to_string()),
            });
        }
        let tolerance = self.tolerance.days;
        if tolerance <= 0 {
            return Err(conversion_error(
                from,
                to,
                &format!("missing on {} and tolerance is zero", date),
            ));
        }
        if let Some((near_date, rate)) = series.range(..=date).next_back() {
            if (date - *near_date).num_days() <= tolerance {
                return Ok(FxLookup {
                    rate: rate.rate,
                    date: *near_date,
                    source: rate
                        .source
                        .clone()
                        .unwrap_or_else(|| "nearest_prior".to_string()),
                });
            }
        }
        Err(conversion_error(
            from,
            to,
            &format!("missing on {} (no prior rate within {} days)", date, tolerance),
        ))
    }
}

impl CurrencyConverter for FxBook {
    fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
        on: NaiveDate,
    ) -> CoreResult<Decimal> {
        let lookup = self.lookup_rate(from, to, on)?;
        debug!(%from, %to, %on, rate = %lookup.rate, source = %lookup.source, "fx conversion");
        Ok(amount * lookup.rate)
    }
}

fn conversion_error(from: &CurrencyCode, to: &CurrencyCode, reason: &str) -> CoreError {
    CoreError::Conversion {
        from: from.clone(),
        to: to.clone(),
        reason: reason.to_string(),
    }
}
