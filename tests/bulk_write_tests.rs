//! End-to-end tests running every primitive against one catalog fixture

use data_manager::core::DataManagerError;
use data_manager::test_utils::CatalogFixture;
use data_manager::core::ObjectKind;
use data_manager::{
    connect, execute, query, resolve, write, CommitMode, Dataset, NamedParams, Value, WriteOptions,
};

fn price_fixture() -> CatalogFixture {
    let mut fixture = CatalogFixture::new().unwrap();
    fixture.create_schema("datafeeds").unwrap();
    fixture
        .create_table(
            "datafeeds",
            "equity_price",
            &[("id", "INTEGER PRIMARY KEY"), ("value", "REAL")],
        )
        .unwrap();
    fixture
}

fn prices(rows: i64) -> Dataset {
    Dataset::from_columns(vec![
        ("id".to_string(), (0..rows).map(Value::from).collect()),
        (
            "value".to_string(),
            (0..rows).map(|i| Value::from(i as f64 / 4.0)).collect(),
        ),
    ])
    .unwrap()
}

#[test]
fn test_quarter_million_rows_written_in_three_batches() {
    let mut fixture = price_fixture();
    let report = write(
        &prices(250_000),
        fixture.connection_mut(),
        "equity_price",
        &WriteOptions::new().schema("datafeeds"),
    )
    .unwrap();

    assert_eq!(report.batch_sizes, vec![100_000, 100_000, 50_000]);
    assert_eq!(fixture.row_count("datafeeds", "equity_price").unwrap(), 250_000);

    let tail = query(
        "SELECT id, value FROM datafeeds.equity_price WHERE id >= :from ORDER BY id",
        fixture.connection_mut(),
        &NamedParams::new().bind("from", 249_998),
    )
    .unwrap();
    assert_eq!(tail.num_rows(), 2);
    assert_eq!(tail.column("value").unwrap()[1], Value::Real(249_999.0 / 4.0));
}

#[test]
fn test_write_then_query_round_trip_preserves_order() {
    let mut fixture = price_fixture();
    write(
        &prices(25),
        fixture.connection_mut(),
        "EQUITY_PRICE",
        &WriteOptions::new().chunk_size(7).commit_mode(CommitMode::PerChunk),
    )
    .unwrap();

    let stored = query(
        "SELECT id FROM datafeeds.equity_price ORDER BY rowid",
        fixture.connection_mut(),
        &NamedParams::new(),
    )
    .unwrap();
    let ids: Vec<i64> = stored.column("id").unwrap().iter().filter_map(Value::as_i64).collect();
    assert_eq!(ids, (0..25).collect::<Vec<_>>());
}

#[test]
fn test_statement_runner_and_writer_error_asymmetry() {
    let mut fixture = price_fixture();

    // The writer propagates a missing schema...
    let err = write(
        &prices(3),
        fixture.connection_mut(),
        "equity_price",
        &WriteOptions::new().schema("archive"),
    )
    .unwrap_err();
    assert!(matches!(err, DataManagerError::NotFound { .. }));

    // ...while the statement runner absorbs database failures.
    let outcome = execute(
        "INSERT INTO datafeeds.equity_price (id, value) VALUES (:id, :value)",
        fixture.connection_mut(),
        &NamedParams::new().bind("id", 1).bind("missing", 2.0),
    );
    assert!(!outcome.is_success());
    assert_eq!(fixture.row_count("datafeeds", "equity_price").unwrap(), 0);

    let outcome = execute(
        "DELETE FROM datafeeds.equity_price WHERE id < :id",
        fixture.connection_mut(),
        &NamedParams::new().bind("id", 10),
    );
    assert!(outcome.is_success());
}

#[test]
fn test_primitives_on_plain_sqlite_connection() {
    let mut conn = connect(":memory:").unwrap();
    conn.execute_batch(
        "CREATE TABLE equity_price (id INTEGER PRIMARY KEY, value REAL);
         ATTACH DATABASE ':memory:' AS staging;
         CREATE TABLE staging.equity_price (id INTEGER PRIMARY KEY, value REAL);",
    )
    .unwrap();

    let report = write(
        &prices(10),
        &mut conn,
        "Equity_Price",
        &WriteOptions::new().schema("MAIN").chunk_size(4),
    )
    .unwrap();
    assert_eq!(report.target.to_string(), "main.equity_price");
    assert_eq!(report.batch_sizes, vec![4, 4, 2]);

    let stored = query(
        "SELECT COUNT(*) AS n FROM main.equity_price",
        &mut conn,
        &NamedParams::new(),
    )
    .unwrap();
    assert_eq!(stored.column("n").unwrap()[0], Value::Integer(10));

    let staged = resolve("equity_price", &mut conn, Some("staging"), true).unwrap();
    assert_eq!(staged.quoted(), "\"staging\".\"equity_price\"");

    let err = resolve("equity_price", &mut conn, Some("archive"), true).unwrap_err();
    assert!(matches!(
        err,
        DataManagerError::NotFound { kind: ObjectKind::Schema, .. }
    ));

    let outcome = execute(
        "DELETE FROM main.equity_price WHERE id >= :from",
        &mut conn,
        &NamedParams::new().bind("from", 5),
    );
    assert!(outcome.is_success());
}
