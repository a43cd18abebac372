//! Rounding rules shared by every levy computation.
//!
//! A total is rounded exactly once, at the end, using the engine's
//! [`RoundingPolicy`]. Per-band amounts are then apportioned so that they add
//! up to the rounded total to the last unit.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Largest scale a `Decimal` can represent.
const MAX_DECIMAL_PLACES: u32 = 28;

/// How midpoints are resolved when rounding a total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// 0.5 rounds away from zero (2.345 → 2.35).
    #[default]
    HalfUp,
    /// Banker's rounding: 0.5 rounds to the even neighbour (2.345 → 2.34).
    HalfEven,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

/// Precision and midpoint rule for levy totals.
///
/// The default rounds to two decimal places, half-up, which is standard for
/// currency amounts.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use rate_core::calculations::{RoundingMode, RoundingPolicy};
///
/// let cents = RoundingPolicy::default();
/// assert_eq!(cents.round(dec!(123.455)), dec!(123.46));
///
/// let whole = RoundingPolicy::new(0, RoundingMode::HalfEven);
/// assert_eq!(whole.round(dec!(2.5)), dec!(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundingPolicy {
    pub decimal_places: u32,
    pub mode: RoundingMode,
}

impl RoundingPolicy {
    pub fn new(
        decimal_places: u32,
        mode: RoundingMode,
    ) -> Self {
        Self {
            decimal_places: decimal_places.min(MAX_DECIMAL_PLACES),
            mode,
        }
    }

    fn places(&self) -> u32 {
        self.decimal_places.min(MAX_DECIMAL_PLACES)
    }

    /// Rounds `value` to the policy's precision using its midpoint rule.
    pub fn round(
        &self,
        value: Decimal,
    ) -> Decimal {
        value.round_dp_with_strategy(self.places(), self.mode.strategy())
    }

    /// Smallest representable step at the policy's precision (0.01 for cents).
    pub fn unit(&self) -> Decimal {
        Decimal::new(1, self.places())
    }

    fn truncate(
        &self,
        value: Decimal,
    ) -> Decimal {
        value.round_dp_with_strategy(self.places(), RoundingStrategy::ToZero)
    }

    /// Splits `total` across `exact` parts at the policy's precision using the
    /// largest-remainder method.
    ///
    /// Every part is first truncated; the units still missing from `total`
    /// go one each to the parts with the largest truncated remainders, later
    /// parts winning ties. For non-negative parts and `total` equal to
    /// `self.round(sum(exact))` the result is non-negative, each element is
    /// within one unit of its exact value, and the elements sum to `total`.
    pub fn apportion(
        &self,
        exact: &[Decimal],
        total: Decimal,
    ) -> Vec<Decimal> {
        let unit = self.unit();
        let mut parts: Vec<Decimal> = exact.iter().map(|v| self.truncate(*v)).collect();
        let mut shortfall = total - parts.iter().sum::<Decimal>();

        let mut order: Vec<usize> = (0..exact.len()).collect();
        order.sort_by(|&a, &b| {
            let rem_a = exact[a] - parts[a];
            let rem_b = exact[b] - parts[b];
            rem_b.cmp(&rem_a).then(b.cmp(&a))
        });

        for index in order {
            if shortfall < unit {
                break;
            }
            parts[index] += unit;
            shortfall -= unit;
        }

        // Only reachable when `total` was not derived from `exact`.
        if !shortfall.is_zero() {
            if let Some(last) = parts.last_mut() {
                *last += shortfall;
            }
        }

        parts
    }
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            mode: RoundingMode::HalfUp,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // round tests
    // =========================================================================

    #[test]
    fn half_up_rounds_up_at_midpoint() {
        let policy = RoundingPolicy::default();

        assert_eq!(policy.round(dec!(123.455)), dec!(123.46));
    }

    #[test]
    fn half_up_rounds_down_below_midpoint() {
        let policy = RoundingPolicy::default();

        assert_eq!(policy.round(dec!(123.454)), dec!(123.45));
    }

    #[test]
    fn half_even_rounds_to_even_neighbour() {
        let policy = RoundingPolicy::new(2, RoundingMode::HalfEven);

        assert_eq!(policy.round(dec!(123.455)), dec!(123.46));
        assert_eq!(policy.round(dec!(123.445)), dec!(123.44));
    }

    #[test]
    fn zero_places_rounds_to_whole_units() {
        let policy = RoundingPolicy::new(0, RoundingMode::HalfUp);

        assert_eq!(policy.round(dec!(2.5)), dec!(3));
        assert_eq!(policy.unit(), dec!(1));
    }

    #[test]
    fn places_are_clamped_to_decimal_scale() {
        let policy = RoundingPolicy::new(40, RoundingMode::HalfUp);

        assert_eq!(policy.decimal_places, 28);
        assert_eq!(policy.unit(), Decimal::new(1, 28));
    }

    #[test]
    fn unit_for_cents() {
        assert_eq!(RoundingPolicy::default().unit(), dec!(0.01));
    }

    // =========================================================================
    // apportion tests
    // =========================================================================

    #[test]
    fn apportion_keeps_exact_parts() {
        let policy = RoundingPolicy::default();

        let parts = policy.apportion(&[dec!(1.25), dec!(3.50)], dec!(4.75));

        assert_eq!(parts, vec![dec!(1.25), dec!(3.50)]);
    }

    #[test]
    fn apportion_gives_unit_to_largest_remainder() {
        let policy = RoundingPolicy::default();
        let exact = [dec!(0.333), dec!(0.333), dec!(0.334)];
        let total = policy.round(exact.iter().sum());

        let parts = policy.apportion(&exact, total);

        assert_eq!(total, dec!(1.00));
        assert_eq!(parts, vec![dec!(0.33), dec!(0.33), dec!(0.34)]);
    }

    #[test]
    fn apportion_breaks_ties_toward_later_parts() {
        let policy = RoundingPolicy::default();
        let exact = [dec!(0.005), dec!(0.005)];
        let total = policy.round(exact.iter().sum());

        let parts = policy.apportion(&exact, total);

        assert_eq!(total, dec!(0.01));
        assert_eq!(parts, vec![dec!(0.00), dec!(0.01)]);
    }

    #[test]
    fn apportion_never_goes_negative() {
        let policy = RoundingPolicy::new(0, RoundingMode::HalfEven);
        let exact = [dec!(0), dec!(0.5), dec!(0.5), dec!(0.5)];
        let total = policy.round(exact.iter().sum());

        let parts = policy.apportion(&exact, total);

        assert_eq!(total, dec!(2));
        assert!(parts.iter().all(|p| *p >= Decimal::ZERO));
        assert_eq!(parts.iter().sum::<Decimal>(), total);
        assert_eq!(parts[0], dec!(0));
    }

    #[test]
    fn apportion_empty_is_empty() {
        let policy = RoundingPolicy::default();

        assert!(policy.apportion(&[], Decimal::ZERO).is_empty());
    }
}
