mod effective_period;
mod rate_band;
mod rate_table;

pub use effective_period::EffectivePeriod;
pub use rate_band::{Bound, RateBand};
pub use rate_table::{RateTable, ValidationError};
