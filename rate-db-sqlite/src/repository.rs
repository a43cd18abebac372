use async_trait::async_trait;
use chrono::NaiveDate;
use rate_core::{
    Bound, EffectivePeriod, RateBand, RateTable, RepositoryError, TableRepository,
};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, warn};

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect using a sqlx URL such as `sqlite:rates.db?mode=rwc`.
    pub async fn new(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = SqlitePool::connect(database_url).await.map_err(|e| {
            RepositoryError::Connection(format!(
                "Failed to connect to database {}: {}",
                database_url, e
            ))
        })?;
        Ok(Self { pool })
    }

    /// A private in-memory database. The pool holds exactly one connection
    /// that is never recycled, because every SQLite `:memory:` connection is
    /// a separate database.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to run migrations: {}", e)))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn bands_for(
        &self,
        table_id: i64,
    ) -> Result<Vec<RateBand>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT lower_bound, upper_bound, rate
             FROM rate_band WHERE table_id = ? ORDER BY position",
        )
        .bind(table_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_band).collect()
    }
}

fn row_to_band(row: &SqliteRow) -> Result<RateBand, RepositoryError> {
    Ok(RateBand {
        lower_bound: get_decimal(row, "lower_bound")?,
        upper_bound: Bound::from(get_optional_decimal(row, "upper_bound")?),
        rate: get_decimal(row, "rate")?,
    })
}

fn row_to_period(row: &SqliteRow) -> Result<EffectivePeriod, RepositoryError> {
    let from: NaiveDate = row
        .try_get("effective_from")
        .map_err(|e| RepositoryError::Database(format!("Failed to get effective_from: {}", e)))?;
    let to: Option<NaiveDate> = row
        .try_get("effective_to")
        .map_err(|e| RepositoryError::Database(format!("Failed to get effective_to: {}", e)))?;
    Ok(EffectivePeriod::new(from, to))
}

async fn insert_locked(
    conn: &mut SqliteConnection,
    table: &RateTable,
) -> Result<(), RepositoryError> {
    let existing = sqlx::query(
        "SELECT effective_from, effective_to FROM rate_table WHERE name = ?",
    )
    .bind(table.name())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    for row in &existing {
        let period = row_to_period(row)?;
        if period.overlaps(table.period()) {
            warn!(
                table = table.name(),
                existing = %period,
                requested = %table.period(),
                "rejected overlapping rate table"
            );
            return Err(RepositoryError::OverlappingPeriod {
                name: table.name().to_string(),
                existing: period,
                requested: *table.period(),
            });
        }
    }

    let table_id = sqlx::query(
        "INSERT INTO rate_table (name, effective_from, effective_to) VALUES (?, ?, ?)",
    )
    .bind(table.name())
    .bind(table.period().from)
    .bind(table.period().to)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?
    .last_insert_rowid();

    for (position, band) in table.bands().iter().enumerate() {
        sqlx::query(
            "INSERT INTO rate_band (table_id, position, lower_bound, upper_bound, rate)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(table_id)
        .bind(position as i64)
        .bind(decimal_to_text(band.lower_bound))
        .bind(band.upper_bound.value().map(decimal_to_text))
        .bind(decimal_to_text(band.rate))
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }

    Ok(())
}

#[async_trait]
impl TableRepository for SqliteRepository {
    async fn tables_named(&self, name: &str) -> Result<Vec<RateTable>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, effective_from, effective_to
             FROM rate_table WHERE name = ? ORDER BY effective_from",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("id").map_err(db_err)?;
            let period = row_to_period(row)?;
            let bands = self.bands_for(id).await?;
            // Rows are re-validated; hand-edited data never reaches the engine unchecked.
            tables.push(RateTable::build(name, period, bands)?);
        }

        debug!(table = name, count = tables.len(), "loaded rate tables");
        Ok(tables)
    }

    async fn list_table_names(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT DISTINCT name FROM rate_table ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get("name").map_err(db_err))
            .collect()
    }

    async fn insert_table(&self, table: &RateTable) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        // IMMEDIATE takes the write lock up front; concurrent writers queue
        // on the busy timeout instead of failing with SQLITE_BUSY mid-transaction.
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;

        let result = match insert_locked(&mut conn, table).await {
            Ok(()) => sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map(|_| ())
                .map_err(db_err),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %e, "rollback failed; discarding connection");
                conn.close_on_drop();
            }
        }
        result
    }

    async fn delete_table(
        &self,
        name: &str,
        period: &EffectivePeriod,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let id: Option<i64> = sqlx::query(
            "SELECT id FROM rate_table
             WHERE name = ? AND effective_from = ? AND effective_to IS ?",
        )
        .bind(name)
        .bind(period.from)
        .bind(period.to)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .map(|row| row.try_get("id"))
        .transpose()
        .map_err(db_err)?;

        let Some(id) = id else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM rate_band WHERE table_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM rate_table WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }
}
