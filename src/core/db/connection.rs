/// Connection Module
///
/// This module implements the driver seam on top of rusqlite: a
/// `rusqlite::Connection` is an `Engine`, and a `rusqlite::Transaction` is
/// its `Session`. Statements are scoped to the call that prepared them, so
/// cursors are released on every exit path.
use crate::core::db::engine::{CatalogDialect, Engine, NamedParams, Session};
use crate::core::Result;
use crate::dataset::{Chunk, Dataset, Value};
use rusqlite::{params_from_iter, Connection, ToSql, Transaction};
use std::collections::HashSet;
use tracing::debug;

/// Opens a SQLite database at the specified path.
///
/// # Arguments
///
/// * `db_path` - Path to the SQLite database file, or ":memory:" for an in-memory database
///
/// # Returns
///
/// The open connection, or `DataManagerError::Database` on failure.
pub fn connect(db_path: &str) -> Result<Connection> {
    let conn = if db_path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(db_path)?
    };

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    debug!(path = db_path, "opened database connection");
    Ok(conn)
}

/// Prefixes parameter names with the `:` rusqlite expects.
fn placeholder_names(params: &NamedParams) -> Vec<String> {
    params.iter().map(|(name, _)| format!(":{}", name)).collect()
}

/// Makes result column names unique, suffixing repeats with `_1`, `_2`, ...
/// in result order.
fn unique_column_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut suffix = 1;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        taken.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}

fn fetch_on(conn: &Connection, sql: &str, params: &NamedParams) -> Result<Dataset> {
    debug!(sql, params = params.len(), "fetching rows");
    let mut stmt = conn.prepare(sql)?;

    let columns = unique_column_names(stmt.column_names().into_iter().map(String::from).collect());
    let column_count = columns.len();

    let names = placeholder_names(params);
    let bound: Vec<(&str, &dyn ToSql)> = names
        .iter()
        .zip(params.iter())
        .map(|(name, (_, value))| (name.as_str(), value as &dyn ToSql))
        .collect();

    let mut rows = stmt.query(bound.as_slice())?;
    let mut values: Vec<Vec<Value>> = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(column_count);
        for i in 0..column_count {
            record.push(Value::from(row.get_ref(i)?));
        }
        values.push(record);
    }

    if values.is_empty() {
        return Ok(Dataset::new());
    }
    Dataset::from_rows(columns, values)
}

fn execute_on(conn: &Connection, sql: &str, params: &NamedParams) -> Result<usize> {
    debug!(sql, params = params.len(), "executing statement");
    let mut stmt = conn.prepare(sql)?;

    let names = placeholder_names(params);
    let bound: Vec<(&str, &dyn ToSql)> = names
        .iter()
        .zip(params.iter())
        .map(|(name, (_, value))| (name.as_str(), value as &dyn ToSql))
        .collect();

    Ok(stmt.execute(bound.as_slice())?)
}

impl Engine for Connection {
    type Session<'s> = Transaction<'s>;

    fn dialect(&self) -> CatalogDialect {
        CatalogDialect::Sqlite
    }

    fn fetch(&mut self, sql: &str, params: &NamedParams) -> Result<Dataset> {
        fetch_on(self, sql, params)
    }

    fn begin(&mut self) -> Result<Self::Session<'_>> {
        Ok(self.transaction()?)
    }
}

impl Session for Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<usize> {
        execute_on(self, sql, params)
    }

    fn execute_batch(&mut self, sql: &str, chunk: &Chunk<'_>) -> Result<usize> {
        debug!(sql, rows = chunk.len(), start = chunk.start(), "executing batch");
        let mut stmt = self.prepare_cached(sql)?;
        let mut affected = 0;
        for row in chunk.rows() {
            affected += stmt.execute(params_from_iter(row))?;
        }
        Ok(affected)
    }

    fn commit(self) -> Result<()> {
        Ok(Transaction::commit(self)?)
    }

    fn rollback(self) -> Result<()> {
        Ok(Transaction::rollback(self)?)
    }
}
