//! Levy calculations over validated rate tables.
//!
//! [`RateEngine`] walks a [`crate::RateTable`] band by band and produces a
//! total plus an itemized breakdown. Rounding is governed by a single
//! [`RoundingPolicy`] applied once to the total.

pub mod common;
pub mod engine;

pub use common::{RoundingMode, RoundingPolicy};
pub use engine::{BandLevy, Evaluation, EvaluationError, RateEngine};
