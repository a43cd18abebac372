use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EffectivePeriod, RateTable, ValidationError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Table '{name}' already has a table effective during {existing}, overlapping {requested}")]
    OverlappingPeriod {
        name: String,
        existing: EffectivePeriod,
        requested: EffectivePeriod,
    },

    #[error("Stored table is invalid: {0}")]
    InvalidData(#[from] ValidationError),
}

/// Storage for rate tables, injected into whatever needs to look tables up.
///
/// Implementations must keep invariant 4 of a rate table: two tables with the
/// same name never have overlapping effective periods.
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Every table stored under `name`, ordered by period start.
    async fn tables_named(&self, name: &str) -> Result<Vec<RateTable>, RepositoryError>;

    /// Distinct table names, sorted.
    async fn list_table_names(&self) -> Result<Vec<String>, RepositoryError>;

    /// Stores `table`.
    ///
    /// Fails with [`RepositoryError::OverlappingPeriod`] if another table of
    /// the same name overlaps its period. A table with an identical name and
    /// period must be deleted first.
    async fn insert_table(&self, table: &RateTable) -> Result<(), RepositoryError>;

    /// Removes the table stored under exactly `name` and `period`.
    /// Returns whether a table was removed.
    async fn delete_table(
        &self,
        name: &str,
        period: &EffectivePeriod,
    ) -> Result<bool, RepositoryError>;
}
