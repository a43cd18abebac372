use std::str::FromStr;

use rate_core::RepositoryError;
use rust_decimal::Decimal;
use sqlx::{Row, TypeInfo, ValueRef};

/// Get a decimal value from a row.
///
/// Amounts are written as TEXT, but INTEGER and REAL cells (from hand-written
/// SQL or older exports) are accepted too.
pub fn get_decimal(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Decimal, RepositoryError> {
    get_optional_decimal(row, column)?
        .ok_or_else(|| RepositoryError::Database(format!("Column '{}' is NULL", column)))
}

/// Get an optional decimal value from a row, returning None for NULL values.
pub fn get_optional_decimal(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{}' not found: {}", column, e)))?;

    if value_ref.is_null() {
        return Ok(None);
    }

    let type_name = value_ref.type_info().name().to_string();

    match type_name.as_str() {
        "TEXT" => {
            let val: String = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get TEXT from '{}': {}", column, e))
            })?;
            Decimal::from_str(val.trim()).map(Some).map_err(|e| {
                RepositoryError::Database(format!(
                    "Invalid decimal '{}' in '{}': {}",
                    val, column, e
                ))
            })
        }
        "INTEGER" => {
            let val: i64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!(
                    "Failed to get INTEGER from '{}': {}",
                    column, e
                ))
            })?;
            Ok(Some(Decimal::from(val)))
        }
        "REAL" => {
            let val: f64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get REAL from '{}': {}", column, e))
            })?;
            Decimal::try_from(val).map(Some).map_err(|e| {
                RepositoryError::Database(format!("Failed to convert {} to Decimal: {}", val, e))
            })
        }
        other => Err(RepositoryError::Database(format!(
            "Unexpected type '{}' for column '{}'",
            other, column
        ))),
    }
}

/// Convert a Decimal to the TEXT form stored in SQLite.
pub fn decimal_to_text(d: Decimal) -> String {
    d.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        sqlx::query(
            "CREATE TABLE test_decimals (
                id INTEGER PRIMARY KEY,
                text_value TEXT,
                int_value INTEGER,
                real_value REAL,
                null_value TEXT
            )",
        )
        .execute(&pool)
        .await
        .expect("Failed to create test table");

        sqlx::query(
            "INSERT INTO test_decimals (id, text_value, int_value, real_value, null_value)
             VALUES (1, '1800000000.25', 672000000, 0.5, NULL)",
        )
        .execute(&pool)
        .await
        .expect("Failed to insert test row");

        pool
    }

    async fn fetch_row(pool: &SqlitePool) -> sqlx::sqlite::SqliteRow {
        sqlx::query("SELECT * FROM test_decimals WHERE id = 1")
            .fetch_one(pool)
            .await
            .expect("Failed to fetch row")
    }

    #[tokio::test]
    async fn reads_text_decimal_exactly() {
        let pool = test_pool().await;
        let row = fetch_row(&pool).await;

        assert_eq!(get_decimal(&row, "text_value").unwrap(), dec!(1800000000.25));
    }

    #[tokio::test]
    async fn reads_integer_decimal() {
        let pool = test_pool().await;
        let row = fetch_row(&pool).await;

        assert_eq!(get_decimal(&row, "int_value").unwrap(), dec!(672000000));
    }

    #[tokio::test]
    async fn reads_real_decimal() {
        let pool = test_pool().await;
        let row = fetch_row(&pool).await;

        assert_eq!(get_decimal(&row, "real_value").unwrap(), dec!(0.5));
    }

    #[tokio::test]
    async fn null_is_none_for_optional() {
        let pool = test_pool().await;
        let row = fetch_row(&pool).await;

        assert_eq!(get_optional_decimal(&row, "null_value").unwrap(), None);
    }

    #[tokio::test]
    async fn null_is_error_for_required() {
        let pool = test_pool().await;
        let row = fetch_row(&pool).await;

        assert!(matches!(
            get_decimal(&row, "null_value"),
            Err(RepositoryError::Database(_))
        ));
    }

    #[tokio::test]
    async fn missing_column_is_error() {
        let pool = test_pool().await;
        let row = fetch_row(&pool).await;

        assert!(matches!(
            get_optional_decimal(&row, "no_such_column"),
            Err(RepositoryError::Database(_))
        ));
    }

    #[test]
    fn text_form_drops_trailing_zeros() {
        assert_eq!(decimal_to_text(dec!(10.500)), "10.5");
        assert_eq!(decimal_to_text(dec!(672000000)), "672000000");
    }
}
