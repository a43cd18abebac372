//! Round trips of rate tables through an in-memory SQLite database.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rate_core::{
    Bound, EffectivePeriod, RateBand, RateEngine, RateTable, RepositoryError, TableRepository,
    TableSelector,
};
use rate_db_sqlite::SqliteRepository;
use rust_decimal_macros::dec;

async fn setup_test_db() -> SqliteRepository {
    let repo = SqliteRepository::in_memory()
        .await
        .expect("Failed to create in-memory database");
    repo.run_migrations()
        .await
        .expect("Failed to run migrations");
    repo
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fy1401() -> EffectivePeriod {
    EffectivePeriod::new(date(2022, 3, 21), Some(date(2023, 3, 21)))
}

fn table_1401() -> RateTable {
    RateTable::build(
        "salary-tax",
        fy1401(),
        vec![
            RateBand::bounded(dec!(0), dec!(672000000), dec!(0)),
            RateBand::bounded(dec!(672000000), dec!(1800000000), dec!(10)),
            RateBand::bounded(dec!(1800000000), dec!(3000000000), dec!(15)),
            RateBand::bounded(dec!(3000000000), dec!(4200000000), dec!(20)),
            RateBand::terminal(dec!(4200000000), dec!(30)),
        ],
    )
    .unwrap()
}

fn table_1402() -> RateTable {
    RateTable::build(
        "salary-tax",
        EffectivePeriod::open_ended(date(2023, 3, 21)),
        vec![
            RateBand::bounded(dec!(0), dec!(1200000000), dec!(0)),
            RateBand::bounded(dec!(1200000000), dec!(1650000000), dec!(10)),
            RateBand::terminal(dec!(1650000000), dec!(15)),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn table_round_trips() {
    let repo = setup_test_db().await;
    let table = table_1401();

    repo.insert_table(&table).await.expect("insert failed");
    let stored = repo.tables_named("salary-tax").await.expect("fetch failed");

    assert_eq!(stored, vec![table]);
}

#[tokio::test]
async fn terminal_band_is_stored_as_null() {
    let repo = setup_test_db().await;
    repo.insert_table(&table_1401()).await.unwrap();

    let nulls: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rate_band WHERE upper_bound IS NULL")
            .fetch_one(repo.pool())
            .await
            .unwrap();

    assert_eq!(nulls, 1);
}

#[tokio::test]
async fn fractional_values_stay_exact() {
    let repo = setup_test_db().await;
    let table = RateTable::build(
        "levy",
        fy1401(),
        vec![
            RateBand::bounded(dec!(0), dec!(1000.005), dec!(2.75)),
            RateBand::terminal(dec!(1000.005), dec!(33.333)),
        ],
    )
    .unwrap();

    repo.insert_table(&table).await.unwrap();
    let stored = repo.tables_named("levy").await.unwrap();

    assert_eq!(stored[0].bands()[0].upper_bound, Bound::Bounded(dec!(1000.005)));
    assert_eq!(stored[0].bands()[1].rate, dec!(33.333));
}

#[tokio::test]
async fn tables_come_back_ordered_by_period() {
    let repo = setup_test_db().await;
    repo.insert_table(&table_1402()).await.unwrap();
    repo.insert_table(&table_1401()).await.unwrap();

    let stored = repo.tables_named("salary-tax").await.unwrap();

    let starts: Vec<_> = stored.iter().map(|t| t.period().from).collect();
    assert_eq!(starts, vec![date(2022, 3, 21), date(2023, 3, 21)]);
}

#[tokio::test]
async fn overlapping_insert_is_rejected() {
    let repo = setup_test_db().await;
    repo.insert_table(&table_1401()).await.unwrap();
    let overlapping = RateTable::build(
        "salary-tax",
        EffectivePeriod::open_ended(date(2023, 1, 1)),
        vec![RateBand::terminal(dec!(0), dec!(10))],
    )
    .unwrap();

    let result = repo.insert_table(&overlapping).await;

    assert!(matches!(result, Err(RepositoryError::OverlappingPeriod { .. })));
    assert_eq!(repo.tables_named("salary-tax").await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_then_reinsert_replaces_table() {
    let repo = setup_test_db().await;
    repo.insert_table(&table_1401()).await.unwrap();

    assert!(repo.delete_table("salary-tax", &fy1401()).await.unwrap());
    assert!(!repo.delete_table("salary-tax", &fy1401()).await.unwrap());

    let band_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rate_band")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(band_rows, 0);

    repo.insert_table(&table_1401()).await.unwrap();
    assert_eq!(repo.tables_named("salary-tax").await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_matches_open_ended_period() {
    let repo = setup_test_db().await;
    repo.insert_table(&table_1402()).await.unwrap();

    let removed = repo
        .delete_table("salary-tax", &EffectivePeriod::open_ended(date(2023, 3, 21)))
        .await
        .unwrap();

    assert!(removed);
    assert!(repo.list_table_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_stored_bands_are_reported() {
    let repo = setup_test_db().await;
    sqlx::query(
        "INSERT INTO rate_table (id, name, effective_from, effective_to)
         VALUES (1, 'broken', '2022-03-21', NULL)",
    )
    .execute(repo.pool())
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO rate_band (table_id, position, lower_bound, upper_bound, rate) VALUES
         (1, 0, '0', '100', '5'),
         (1, 1, '150', NULL, '10')",
    )
    .execute(repo.pool())
    .await
    .unwrap();

    let result = repo.tables_named("broken").await;

    assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
}

#[tokio::test]
async fn selected_table_evaluates() {
    let repo = setup_test_db().await;
    repo.insert_table(&table_1401()).await.unwrap();
    repo.insert_table(&table_1402()).await.unwrap();

    let table = TableSelector::new(&repo)
        .resolve("salary-tax", date(2022, 10, 1))
        .await
        .unwrap();
    let result = RateEngine::default().evaluate(&table, dec!(1000000000)).unwrap();

    assert_eq!(result.total, dec!(32800000));
}

#[tokio::test]
async fn lists_distinct_names() {
    let repo = setup_test_db().await;
    repo.insert_table(&table_1401()).await.unwrap();
    repo.insert_table(&table_1402()).await.unwrap();

    assert_eq!(
        repo.list_table_names().await.unwrap(),
        vec!["salary-tax".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_overlapping_inserts_on_file_database() {
    let path = std::env::temp_dir().join(format!("rate-db-race-{}.db", std::process::id()));
    std::fs::remove_file(&path).ok();
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let first = SqliteRepository::new(&url).await.expect("Failed to open database");
    first.run_migrations().await.expect("Failed to run migrations");
    let second = SqliteRepository::new(&url).await.expect("Failed to open database");

    let open_ended = RateTable::build(
        "salary-tax",
        EffectivePeriod::open_ended(date(2022, 9, 1)),
        vec![RateBand::terminal(dec!(0), dec!(12))],
    )
    .unwrap();

    let closed = table_1401();
    let (a, b) = tokio::join!(
        first.insert_table(&closed),
        second.insert_table(&open_ended)
    );

    let overlaps = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(RepositoryError::OverlappingPeriod { .. })))
        .count();
    assert!(a.is_ok() || b.is_ok(), "one insert should win: {a:?} / {b:?}");
    assert_eq!(overlaps, 1, "the other should see the overlap: {a:?} / {b:?}");
    assert_eq!(first.tables_named("salary-tax").await.unwrap().len(), 1);

    first.pool().close().await;
    second.pool().close().await;
    std::fs::remove_file(&path).ok();
}
