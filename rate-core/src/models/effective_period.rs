use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Half-open date interval `[from, to)` during which a rate table applies.
/// `to == None` leaves the period open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectivePeriod {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl EffectivePeriod {
    pub fn new(
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Self {
        Self { from, to }
    }

    pub fn open_ended(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    /// A period is empty when its end does not come after its start.
    pub fn is_empty(&self) -> bool {
        self.to.is_some_and(|to| to <= self.from)
    }

    pub fn contains(
        &self,
        date: NaiveDate,
    ) -> bool {
        date >= self.from && self.to.is_none_or(|to| date < to)
    }

    pub fn overlaps(
        &self,
        other: &EffectivePeriod,
    ) -> bool {
        let self_starts_before_other_ends = other.to.is_none_or(|to| self.from < to);
        let other_starts_before_self_ends = self.to.is_none_or(|to| other.from < to);
        self_starts_before_other_ends && other_starts_before_self_ends
    }
}

impl fmt::Display for EffectivePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) => write!(f, "[{}, {})", self.from, to),
            None => write!(f, "[{}, …)", self.from),
        }
    }
}
