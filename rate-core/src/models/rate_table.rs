use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::{Bound, EffectivePeriod, RateBand};

const MAX_RATE: Decimal = Decimal::ONE_HUNDRED;

/// Reasons a set of bands cannot form a rate table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("rate table has no bands")]
    EmptyTable,

    #[error("band {index} is not contiguous: expected lower bound {expected}, found {found}")]
    NonContiguous {
        index: usize,
        expected: Bound,
        found: Decimal,
    },

    #[error("rate table has no terminal (unbounded) band")]
    NoTerminalBand,

    #[error("rate table has {count} terminal bands, expected exactly one")]
    MultipleTerminalBands { count: usize },

    #[error("band {index} has rate {rate}, expected a percentage between 0 and 100")]
    InvalidRate { index: usize, rate: Decimal },

    #[error("band {index} has negative bound {bound}")]
    NegativeBound { index: usize, bound: Decimal },

    #[error("band {index} is empty: upper bound {upper} does not exceed lower bound {lower}")]
    DegenerateBand {
        index: usize,
        lower: Decimal,
        upper: Decimal,
    },

    #[error("effective period {period} is empty")]
    InvalidPeriod { period: EffectivePeriod },
}

/// A validated, immutable set of marginal rate bands for one effective period.
///
/// The only way to obtain a `RateTable` is [`RateTable::build`], so every
/// instance in circulation satisfies:
///
/// - bands are sorted by `lower_bound` and start at a non-negative bound,
/// - each band's upper bound is the next band's lower bound,
/// - exactly one band is terminal and it is the last one,
/// - every rate lies in `[0, 100]`.
///
/// Amending a table means building a new one; there are no mutators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateTable {
    name: String,
    period: EffectivePeriod,
    bands: Vec<RateBand>,
}

impl RateTable {
    /// Sorts `bands` by lower bound and validates them.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found. Band indices in errors
    /// refer to positions after sorting.
    pub fn build(
        name: impl Into<String>,
        period: EffectivePeriod,
        mut bands: Vec<RateBand>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();

        if bands.is_empty() {
            return Err(ValidationError::EmptyTable);
        }

        bands.sort_by(|a, b| a.lower_bound.cmp(&b.lower_bound));

        for (index, band) in bands.iter().enumerate() {
            check_band(index, band)?;
        }

        check_terminal(&bands)?;
        check_contiguous(&bands)?;

        if period.is_empty() {
            return Err(ValidationError::InvalidPeriod { period });
        }

        debug!(table = %name, %period, bands = bands.len(), "built rate table");

        Ok(Self {
            name,
            period,
            bands,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> &EffectivePeriod {
        &self.period
    }

    pub fn bands(&self) -> &[RateBand] {
        &self.bands
    }

    /// The open-ended top band.
    pub fn terminal_band(&self) -> &RateBand {
        // build() guarantees a non-empty table ending in the terminal band
        &self.bands[self.bands.len() - 1]
    }

    /// The band whose range `(lower, upper]` holds `amount`, or the first band
    /// for amounts at or below its lower bound.
    pub fn band_for(
        &self,
        amount: Decimal,
    ) -> &RateBand {
        self.bands
            .iter()
            .find(|band| band.upper_bound.covers(amount))
            .unwrap_or_else(|| self.terminal_band())
    }
}

fn check_band(
    index: usize,
    band: &RateBand,
) -> Result<(), ValidationError> {
    if band.rate < Decimal::ZERO || band.rate > MAX_RATE {
        return Err(ValidationError::InvalidRate {
            index,
            rate: band.rate,
        });
    }

    if band.lower_bound < Decimal::ZERO {
        return Err(ValidationError::NegativeBound {
            index,
            bound: band.lower_bound,
        });
    }

    if let Bound::Bounded(upper) = band.upper_bound {
        if upper < Decimal::ZERO {
            return Err(ValidationError::NegativeBound {
                index,
                bound: upper,
            });
        }
        if upper <= band.lower_bound {
            return Err(ValidationError::DegenerateBand {
                index,
                lower: band.lower_bound,
                upper,
            });
        }
    }

    Ok(())
}

fn check_terminal(bands: &[RateBand]) -> Result<(), ValidationError> {
    match bands.iter().filter(|b| b.is_terminal()).count() {
        0 => Err(ValidationError::NoTerminalBand),
        1 => Ok(()),
        count => Err(ValidationError::MultipleTerminalBands { count }),
    }
}

/// Also rejects a terminal band that is not last: the band after it would
/// have to start at an unbounded edge.
fn check_contiguous(bands: &[RateBand]) -> Result<(), ValidationError> {
    for (index, pair) in bands.windows(2).enumerate() {
        let (current, next) = (&pair[0], &pair[1]);
        if current.upper_bound != Bound::Bounded(next.lower_bound) {
            return Err(ValidationError::NonContiguous {
                index: index + 1,
                expected: current.upper_bound,
                found: next.lower_bound,
            });
        }
    }
    Ok(())
}
