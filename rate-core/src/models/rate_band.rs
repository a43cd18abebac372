use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upper edge of a band.
///
/// Replaces the `0`-means-infinity convention used by older rate sheets, so a
/// real boundary at zero can never be mistaken for "no boundary".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Bound {
    Bounded(Decimal),
    Unbounded,
}

impl Bound {
    /// The finite edge, if any.
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Bounded(v) => Some(*v),
            Self::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Whether `amount` lies at or below this edge.
    pub fn covers(&self, amount: Decimal) -> bool {
        match self {
            Self::Bounded(v) => amount <= *v,
            Self::Unbounded => true,
        }
    }
}

impl From<Option<Decimal>> for Bound {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Self::Unbounded, Self::Bounded)
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(v) => write!(f, "{v}"),
            Self::Unbounded => f.write_str("∞"),
        }
    }
}

/// A contiguous amount range `(lower_bound, upper_bound]` levied at a
/// marginal `rate`, expressed as a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBand {
    pub lower_bound: Decimal,
    pub upper_bound: Bound,
    pub rate: Decimal,
}

impl RateBand {
    pub fn new(
        lower_bound: Decimal,
        upper_bound: Bound,
        rate: Decimal,
    ) -> Self {
        Self {
            lower_bound,
            upper_bound,
            rate,
        }
    }

    pub fn bounded(
        lower_bound: Decimal,
        upper_bound: Decimal,
        rate: Decimal,
    ) -> Self {
        Self::new(lower_bound, Bound::Bounded(upper_bound), rate)
    }

    /// The open-ended top band.
    pub fn terminal(
        lower_bound: Decimal,
        rate: Decimal,
    ) -> Self {
        Self::new(lower_bound, Bound::Unbounded, rate)
    }

    pub fn is_terminal(&self) -> bool {
        self.upper_bound.is_unbounded()
    }

    /// The part of `amount` that falls inside this band, never negative.
    pub fn portion_of(&self, amount: Decimal) -> Decimal {
        let ceiling = match self.upper_bound {
            Bound::Bounded(upper) => amount.min(upper),
            Bound::Unbounded => amount,
        };
        (ceiling - self.lower_bound).max(Decimal::ZERO)
    }
}

impl fmt::Display for RateBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{} @ {}%", self.lower_bound, self.upper_bound, self.rate)
    }
}
