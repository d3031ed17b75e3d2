/// Bulk Write Module
///
/// Appends a `Dataset` to an existing table in fixed-size chunks. The
/// destination and its columns are confirmed against the catalog on every
/// call; the INSERT text is composed from catalog spellings only and every
/// value is bound.
use crate::catalog::{quote_identifier, resolve, resolve_columns, ResolvedName};
use crate::core::db::{Engine, Session};
use crate::core::{DataManagerError, Result};
use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Rows per insert batch unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// When a multi-chunk write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// One transaction for the whole call; a failure leaves nothing behind
    #[default]
    PerCall,
    /// One transaction per chunk; a failure keeps the chunks already committed
    PerChunk,
}

/// Options for [`write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub schema_name: Option<String>,
    pub chunk_size: usize,
    pub commit_mode: CommitMode,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            schema_name: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            commit_mode: CommitMode::default(),
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        WriteOptions::default()
    }

    pub fn schema(mut self, schema_name: &str) -> Self {
        self.schema_name = Some(schema_name.to_string());
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn commit_mode(mut self, commit_mode: CommitMode) -> Self {
        self.commit_mode = commit_mode;
        self
    }
}

/// Summary of a completed bulk write.
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub target: ResolvedName,
    pub rows_written: usize,
    /// Row count of each batch, in the order they were issued
    pub batch_sizes: Vec<usize>,
    pub elapsed: Duration,
}

/// Builds `INSERT INTO "schema"."table" ("a", "b") VALUES (:c0, :c1)`.
///
/// Columns must already be catalog-confirmed. Placeholders are positional
/// names, so no column text reaches the parameter list.
pub fn build_insert(target: &ResolvedName, columns: &[String]) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders: Vec<String> = (0..columns.len()).map(|i| format!(":c{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        target.quoted(),
        column_list.join(", "),
        placeholders.join(", ")
    )
}

/// Appends `data` to `table_name`, resolving the destination first.
///
/// Chunks keep the dataset's row order. With [`CommitMode::PerCall`] the
/// whole call is one transaction. With [`CommitMode::PerChunk`] a failure
/// after the first commit is reported as `PartialWrite` and the committed
/// rows stay in place. Elapsed time is logged whether the write commits or
/// fails.
///
/// # Errors
///
/// * `InvalidArgument` for a dataset without columns, a zero chunk size, or
///   columns the table does not have
/// * `NotFound` if the schema or table does not exist
/// * Database errors from the inserts
pub fn write<E: Engine>(
    data: &Dataset,
    engine: &mut E,
    table_name: &str,
    options: &WriteOptions,
) -> Result<WriteReport> {
    let start = Instant::now();
    let written = write_chunks(data, engine, table_name, options);
    let elapsed = start.elapsed();

    match written {
        Ok((target, batch_sizes)) => {
            let rows_written: usize = batch_sizes.iter().sum();
            info!(
                table = %target,
                rows = rows_written,
                batches = batch_sizes.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "committed data"
            );
            Ok(WriteReport {
                target,
                rows_written,
                batch_sizes,
                elapsed,
            })
        }
        Err(err) => {
            warn!(
                table = table_name,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %err,
                "bulk write failed"
            );
            Err(err)
        }
    }
}

fn write_chunks<E: Engine>(
    data: &Dataset,
    engine: &mut E,
    table_name: &str,
    options: &WriteOptions,
) -> Result<(ResolvedName, Vec<usize>)> {
    if data.num_columns() == 0 {
        return Err(DataManagerError::InvalidArgument(
            "dataset has no columns to write".to_string(),
        ));
    }
    let chunks = data.chunks(options.chunk_size)?;

    let target = resolve(table_name, engine, options.schema_name.as_deref(), true)?;
    let columns = resolve_columns(&target, engine, data.column_names().as_slice())?;
    let sql = build_insert(&target, &columns);

    let batch_sizes = match options.commit_mode {
        CommitMode::PerCall => {
            let mut session = engine.begin()?;
            let mut sizes = Vec::new();
            for chunk in chunks {
                session.execute_batch(&sql, &chunk)?;
                sizes.push(chunk.len());
            }
            session.commit()?;
            sizes
        }
        CommitMode::PerChunk => {
            let mut sizes = Vec::new();
            let mut committed_rows = 0;
            for chunk in chunks {
                let issued = engine.begin().and_then(|mut session| {
                    session.execute_batch(&sql, &chunk)?;
                    session.commit()
                });
                if let Err(err) = issued {
                    if committed_rows == 0 {
                        return Err(err);
                    }
                    warn!(table = %target, committed_rows, error = %err, "bulk write stopped after partial commit");
                    return Err(DataManagerError::PartialWrite {
                        committed_rows,
                        source: Box::new(err),
                    });
                }
                committed_rows += chunk.len();
                sizes.push(chunk.len());
            }
            sizes
        }
    };

    Ok((target, batch_sizes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connect;
    use crate::dataset::Value;
    use crate::test_utils::CatalogFixture;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn fixture() -> CatalogFixture {
        let mut fixture = CatalogFixture::new().unwrap();
        fixture.create_schema("datafeeds").unwrap();
        fixture
            .create_table(
                "datafeeds",
                "equity_price",
                &[("id", "INTEGER PRIMARY KEY"), ("value", "TEXT NOT NULL")],
            )
            .unwrap();
        fixture
    }

    fn rows(ids: std::ops::Range<i64>) -> Dataset {
        Dataset::from_columns(vec![
            ("id".to_string(), ids.clone().map(Value::from).collect()),
            (
                "value".to_string(),
                ids.map(|i| Value::from(format!("v{}", i))).collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_insert() {
        let mut fixture = fixture();
        let target = resolve("equity_price", fixture.connection_mut(), None, true).unwrap();
        let sql = build_insert(&target, &["id".to_string(), "value".to_string()]);
        insta::assert_snapshot!(sql, @r#"INSERT INTO "datafeeds"."equity_price" ("id", "value") VALUES (:c0, :c1)"#);
    }

    #[test]
    fn test_write_in_chunks() {
        let mut fixture = fixture();
        let options = WriteOptions::new().schema("DATAFEEDS").chunk_size(4);
        let report = write(&rows(0..10), fixture.connection_mut(), "Equity_Price", &options).unwrap();

        assert_eq!(report.batch_sizes, vec![4, 4, 2]);
        assert_eq!(report.rows_written, 10);
        assert_eq!(report.target.to_string(), "datafeeds.equity_price");
        assert_eq!(fixture.row_count("datafeeds", "equity_price").unwrap(), 10);
    }

    #[test]
    fn test_empty_dataset_writes_nothing() {
        let mut fixture = fixture();
        let report = write(&rows(0..0), fixture.connection_mut(), "equity_price", &WriteOptions::new()).unwrap();
        assert!(report.batch_sizes.is_empty());
        assert_eq!(report.rows_written, 0);
    }

    #[test]
    fn test_missing_table_propagates_not_found() {
        let mut fixture = fixture();
        let err = write(&rows(0..3), fixture.connection_mut(), "bond_price", &WriteOptions::new()).unwrap_err();
        assert!(matches!(err, DataManagerError::NotFound { .. }));
    }

    #[test]
    fn test_unknown_column_rejected_before_insert() {
        let mut fixture = fixture();
        let data = Dataset::from_columns(vec![("ticker".to_string(), vec![Value::from("AAPL")])]).unwrap();
        let err = write(&data, fixture.connection_mut(), "equity_price", &WriteOptions::new()).unwrap_err();
        assert!(matches!(err, DataManagerError::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let mut fixture = fixture();
        let err = write(&Dataset::new(), fixture.connection_mut(), "equity_price", &WriteOptions::new()).unwrap_err();
        assert!(matches!(err, DataManagerError::InvalidArgument(_)));

        let err = write(
            &rows(0..3),
            fixture.connection_mut(),
            "equity_price",
            &WriteOptions::new().chunk_size(0),
        )
        .unwrap_err();
        assert!(matches!(err, DataManagerError::InvalidArgument(_)));
    }

    #[test]
    fn test_per_call_failure_rolls_back_everything() {
        let mut fixture = fixture();
        fixture
            .connection()
            .execute("INSERT INTO datafeeds.equity_price VALUES (7, 'existing')", [])
            .unwrap();

        let err = write(
            &rows(0..10),
            fixture.connection_mut(),
            "equity_price",
            &WriteOptions::new().chunk_size(4),
        )
        .unwrap_err();

        assert!(err.is_database());
        assert_eq!(fixture.row_count("datafeeds", "equity_price").unwrap(), 1);
    }

    #[test]
    fn test_per_chunk_failure_reports_partial_write() {
        let mut fixture = fixture();
        fixture
            .connection()
            .execute("INSERT INTO datafeeds.equity_price VALUES (7, 'existing')", [])
            .unwrap();

        let err = write(
            &rows(0..10),
            fixture.connection_mut(),
            "equity_price",
            &WriteOptions::new().chunk_size(4).commit_mode(CommitMode::PerChunk),
        )
        .unwrap_err();

        match err {
            DataManagerError::PartialWrite { committed_rows, .. } => assert_eq!(committed_rows, 4),
            other => panic!("Expected PartialWrite, got {:?}", other),
        }
        assert_eq!(fixture.row_count("datafeeds", "equity_price").unwrap(), 5);
    }

    #[test]
    fn test_write_to_plain_sqlite_database() {
        let mut conn = connect(":memory:").unwrap();
        conn.execute_batch("CREATE TABLE prices (id INTEGER PRIMARY KEY, value TEXT NOT NULL)")
            .unwrap();

        let report = write(&rows(0..5), &mut conn, "PRICES", &WriteOptions::new().chunk_size(2)).unwrap();
        assert_eq!(report.target.to_string(), "main.prices");
        assert_eq!(report.batch_sizes, vec![2, 2, 1]);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM prices", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 5);

        let err = write(&rows(0..1), &mut conn, "bond_price", &WriteOptions::new()).unwrap_err();
        assert!(matches!(err, DataManagerError::NotFound { .. }));
    }

    #[test]
    fn test_failed_write_logs_elapsed_time() {
        let mut fixture = fixture();
        let log = CapturedLog::default();
        let sink = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            write(&rows(0..3), fixture.connection_mut(), "bond_price", &WriteOptions::new())
                .unwrap_err()
        });

        assert!(matches!(err, DataManagerError::NotFound { .. }));
        let text = log.text();
        assert!(text.contains("bulk write failed"), "{}", text);
        assert!(text.contains("elapsed_ms="), "{}", text);
    }
}
