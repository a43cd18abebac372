use async_trait::async_trait;
use rate_core::db::{DbConfig, RepositoryFactory};
use rate_core::{RepositoryError, TableRepository};

use crate::repository::SqliteRepository;

/// Map a connection string from configuration to a sqlx URL.
///
/// * `sqlite:...` URLs pass through unchanged.
/// * Anything else is a file path, created if missing.
fn database_url(connection_string: &str) -> String {
    if connection_string.starts_with("sqlite:") {
        connection_string.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", connection_string)
    }
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`rate_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use rate_core::db::RepositoryRegistry;
/// use rate_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string` and run
    /// migrations.
    ///
    /// Accepted connection-string values:
    /// * A bare file path, e.g. `"rates.db"`.  The file is created if it
    ///   does not exist.
    /// * A sqlx URL, e.g. `"sqlite:rates.db?mode=ro"`.
    /// * `":memory:"`, an ephemeral in-memory database (useful for tests).
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TableRepository>, RepositoryError> {
        let repo = if config.connection_string == ":memory:" {
            SqliteRepository::in_memory().await?
        } else {
            SqliteRepository::new(&database_url(&config.connection_string)).await?
        };
        repo.run_migrations().await?;
        Ok(Box::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn backend_name_is_sqlite() {
        assert_eq!(SqliteRepositoryFactory.backend_name(), "sqlite");
    }

    #[test]
    fn bare_path_becomes_create_url() {
        assert_eq!(database_url("rates.db"), "sqlite:rates.db?mode=rwc");
    }

    #[test]
    fn sqlx_url_passes_through() {
        assert_eq!(database_url("sqlite:rates.db?mode=ro"), "sqlite:rates.db?mode=ro");
    }

    #[tokio::test]
    async fn creates_in_memory_repository() {
        let config = DbConfig {
            backend: "sqlite".to_string(),
            connection_string: ":memory:".to_string(),
        };

        let repo = SqliteRepositoryFactory
            .create(&config)
            .await
            .expect("failed to create in-memory repository");

        assert!(repo.list_table_names().await.unwrap().is_empty());
    }
}
