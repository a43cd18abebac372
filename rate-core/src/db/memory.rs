use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use super::repository::{RepositoryError, TableRepository};
use crate::models::{EffectivePeriod, RateTable};

/// A [`TableRepository`] kept entirely in process memory.
///
/// Used by tests and by the `memory` backend of the command-line tool.
#[derive(Debug, Default)]
pub struct InMemoryTableRepository {
    tables: RwLock<BTreeMap<String, Vec<RateTable>>>,
}

impl InMemoryTableRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableRepository for InMemoryTableRepository {
    async fn tables_named(&self, name: &str) -> Result<Vec<RateTable>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.get(name).cloned().unwrap_or_default())
    }

    async fn list_table_names(&self) -> Result<Vec<String>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.keys().cloned().collect())
    }

    async fn insert_table(&self, table: &RateTable) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.name().to_string()).or_default();

        if let Some(existing) = entry.iter().find(|t| t.period().overlaps(table.period())) {
            warn!(
                table = table.name(),
                existing = %existing.period(),
                requested = %table.period(),
                "rejected overlapping rate table"
            );
            return Err(RepositoryError::OverlappingPeriod {
                name: table.name().to_string(),
                existing: *existing.period(),
                requested: *table.period(),
            });
        }

        entry.push(table.clone());
        entry.sort_by_key(|t| t.period().from);
        Ok(())
    }

    async fn delete_table(
        &self,
        name: &str,
        period: &EffectivePeriod,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.get_mut(name) else {
            return Ok(false);
        };

        let before = entry.len();
        entry.retain(|t| t.period() != period);
        let removed = entry.len() != before;

        if entry.is_empty() {
            tables.remove(name);
        }
        Ok(removed)
    }
}
