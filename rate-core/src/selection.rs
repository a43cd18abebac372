//! Picking the one table that applies on a given date.
//!
//! The engine never looks tables up itself. Callers resolve a table here (or
//! with their own lookup) and hand the result to
//! [`crate::RateEngine::evaluate`].

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::db::repository::{RepositoryError, TableRepository};
use crate::models::RateTable;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no rate table applies on {date}")]
    NoApplicableTable { date: NaiveDate },

    #[error("{count} rate tables apply on {date}")]
    AmbiguousTable { date: NaiveDate, count: usize },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Returns the single table whose effective period contains `date`.
///
/// # Errors
///
/// - [`SelectionError::NoApplicableTable`] if no period contains `date`
/// - [`SelectionError::AmbiguousTable`] if more than one does
pub fn select_table<'a>(
    tables: &'a [RateTable],
    date: NaiveDate,
) -> Result<&'a RateTable, SelectionError> {
    let mut matching = tables.iter().filter(|t| t.period().contains(date));

    let Some(first) = matching.next() else {
        return Err(SelectionError::NoApplicableTable { date });
    };

    let others = matching.count();
    if others > 0 {
        return Err(SelectionError::AmbiguousTable {
            date,
            count: others + 1,
        });
    }

    Ok(first)
}

/// Resolves tables by name and date against an injected repository.
pub struct TableSelector<'r, R: TableRepository + ?Sized> {
    repo: &'r R,
}

impl<'r, R: TableRepository + ?Sized> TableSelector<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    /// Loads every table stored as `name` and selects the one effective on
    /// `date`.
    pub async fn resolve(
        &self,
        name: &str,
        date: NaiveDate,
    ) -> Result<RateTable, SelectionError> {
        let tables = self.repo.tables_named(name).await?;
        let table = select_table(&tables, date)?;

        debug!(table = name, %date, period = %table.period(), "selected rate table");

        Ok(table.clone())
    }
}
