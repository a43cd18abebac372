//! Marginal (progressive) levy evaluation.
//!
//! Each band's rate applies only to the slice of the amount that falls inside
//! that band. Bands are visited in ascending order until the band holding the
//! amount has been levied; the terminal band levies everything above the last
//! finite threshold.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use rate_core::{EffectivePeriod, RateBand, RateEngine, RateTable};
//!
//! let table = RateTable::build(
//!     "income-tax",
//!     EffectivePeriod::open_ended(NaiveDate::from_ymd_opt(2022, 3, 21).unwrap()),
//!     vec![
//!         RateBand::bounded(dec!(0), dec!(672000000), dec!(0)),
//!         RateBand::bounded(dec!(672000000), dec!(1800000000), dec!(10)),
//!         RateBand::terminal(dec!(1800000000), dec!(15)),
//!     ],
//! )
//! .unwrap();
//!
//! let evaluation = RateEngine::default().evaluate(&table, dec!(1000000000)).unwrap();
//!
//! assert_eq!(evaluation.total, dec!(32800000));
//! assert_eq!(evaluation.breakdown.len(), 2);
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::common::RoundingPolicy;
use crate::{RateBand, RateTable};

/// Errors that can occur while evaluating an amount against a table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// The amount is negative or not a finite number.
    #[error("invalid amount {0}: expected a finite, non-negative number")]
    InvalidAmount(String),

    /// Decimal arithmetic exceeded the representable range.
    #[error("levy for amount {0} overflows decimal arithmetic")]
    Overflow(Decimal),
}

/// The levy attributed to a single band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandLevy {
    pub band: RateBand,

    /// Part of the amount that fell inside this band.
    pub taxed_portion: Decimal,

    /// This band's share of the rounded total.
    pub levied_amount: Decimal,

    /// `taxed_portion * rate / 100` before any rounding.
    pub exact_levy: Decimal,
}

/// Result of evaluating one amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub amount: Decimal,

    /// Rounded levy. Always equals the sum of `breakdown[].levied_amount`.
    pub total: Decimal,

    /// Exact sum of the per-band levies.
    pub unrounded_total: Decimal,

    /// One entry per band the amount reaches, in ascending band order.
    pub breakdown: Vec<BandLevy>,
}

impl Evaluation {
    fn zero(amount: Decimal) -> Self {
        Self {
            amount,
            total: Decimal::ZERO,
            unrounded_total: Decimal::ZERO,
            breakdown: Vec::new(),
        }
    }

    /// Total levy as a percentage of the amount, `None` for a zero amount.
    pub fn effective_rate(&self) -> Option<Decimal> {
        if self.amount.is_zero() {
            return None;
        }
        self.total
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(self.amount))
    }

    /// Rate of the highest band the amount reached.
    pub fn marginal_rate(&self) -> Option<Decimal> {
        self.breakdown.last().map(|levy| levy.band.rate)
    }
}

/// Stateless evaluator; holds only its rounding policy.
///
/// A `RateEngine` is `Copy` and shares nothing mutable, so it can be used
/// from any number of threads at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateEngine {
    rounding: RoundingPolicy,
}

impl RateEngine {
    pub fn new(rounding: RoundingPolicy) -> Self {
        Self { rounding }
    }

    pub fn rounding(&self) -> RoundingPolicy {
        self.rounding
    }

    /// Computes the levy on `amount` under `table`.
    ///
    /// # Errors
    ///
    /// - [`EvaluationError::InvalidAmount`] if `amount` is negative
    /// - [`EvaluationError::Overflow`] if a band's levy cannot be represented
    pub fn evaluate(
        &self,
        table: &RateTable,
        amount: Decimal,
    ) -> Result<Evaluation, EvaluationError> {
        if amount < Decimal::ZERO {
            return Err(EvaluationError::InvalidAmount(amount.to_string()));
        }
        if amount.is_zero() {
            return Ok(Evaluation::zero(amount));
        }

        let mut reached: Vec<(&RateBand, Decimal, Decimal)> = Vec::new();
        for band in table.bands() {
            let portion = band.portion_of(amount);
            if portion > Decimal::ZERO {
                let exact = levy(portion, band.rate).ok_or(EvaluationError::Overflow(amount))?;
                reached.push((band, portion, exact));
            }
            if band.upper_bound.covers(amount) {
                break;
            }
        }

        let exact: Vec<Decimal> = reached.iter().map(|(_, _, levy)| *levy).collect();
        let unrounded_total = exact
            .iter()
            .try_fold(Decimal::ZERO, |acc, levy| acc.checked_add(*levy))
            .ok_or(EvaluationError::Overflow(amount))?;
        let total = self.rounding.round(unrounded_total);
        let levied = self.rounding.apportion(&exact, total);

        let breakdown = reached
            .into_iter()
            .zip(levied)
            .map(|((band, taxed_portion, exact_levy), levied_amount)| BandLevy {
                band: band.clone(),
                taxed_portion,
                levied_amount,
                exact_levy,
            })
            .collect();

        debug!(
            table = table.name(),
            %amount,
            %total,
            "evaluated amount"
        );

        Ok(Evaluation {
            amount,
            total,
            unrounded_total,
            breakdown,
        })
    }

    /// Like [`RateEngine::evaluate`] for amounts that arrive as floats.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::InvalidAmount`] for NaN, infinities, values outside
    /// the decimal range and negative values.
    pub fn evaluate_f64(
        &self,
        table: &RateTable,
        amount: f64,
    ) -> Result<Evaluation, EvaluationError> {
        if !amount.is_finite() {
            return Err(EvaluationError::InvalidAmount(amount.to_string()));
        }
        let amount = Decimal::try_from(amount)
            .map_err(|_| EvaluationError::InvalidAmount(amount.to_string()))?;
        self.evaluate(table, amount)
    }
}

/// The rate is scaled to a fraction first so the product never exceeds the
/// portion; `rate / 100` is exact for rates in `[0, 100]`.
fn levy(
    portion: Decimal,
    rate: Decimal,
) -> Option<Decimal> {
    portion.checked_mul(rate.checked_div(Decimal::ONE_HUNDRED)?)
}
