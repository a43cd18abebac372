pub mod calculations;
pub mod db;
pub mod models;
pub mod selection;

pub use calculations::{BandLevy, Evaluation, EvaluationError, RateEngine, RoundingMode, RoundingPolicy};
pub use db::repository::{RepositoryError, TableRepository};
pub use models::*;
pub use selection::{SelectionError, TableSelector, select_table};
