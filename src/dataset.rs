/// Tabular Dataset Module
///
/// A `Dataset` is an ordered set of uniquely named columns whose values are
/// aligned by row index. It is both the result of a query and the input of a
/// bulk write, which consumes it in contiguous `Chunk`s.
use crate::core::{DataManagerError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<BLOB {} bytes>", b.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// A named column of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

fn json_scalar(value: &serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real))
            .ok_or_else(|| {
                DataManagerError::InvalidArgument(format!("number {} is out of range", n))
            }),
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        other => Err(DataManagerError::InvalidArgument(format!(
            "nested value `{}` cannot be stored in a column",
            other
        ))),
    }
}

/// Column-oriented table of values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// An empty dataset: no columns, no rows.
    pub fn new() -> Self {
        Dataset::default()
    }

    /// Builds a dataset from named columns.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a name repeats or the columns differ in length.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let mut seen = HashSet::new();
        let expected = columns.first().map(|(_, values)| values.len());
        for (name, values) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(DataManagerError::InvalidArgument(format!(
                    "duplicate column name `{}`",
                    name
                )));
            }
            if Some(values.len()) != expected {
                return Err(DataManagerError::InvalidArgument(format!(
                    "column `{}` has {} values, expected {}",
                    name,
                    values.len(),
                    expected.unwrap_or(0)
                )));
            }
        }

        Ok(Dataset {
            columns: columns
                .into_iter()
                .map(|(name, values)| Column { name, values })
                .collect(),
        })
    }

    /// Builds a dataset from column names and row-major values.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut dataset = Dataset::from_columns(
            names
                .into_iter()
                .map(|name| (name, Vec::with_capacity(rows.len())))
                .collect(),
        )?;
        for row in rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    /// Appends one row; its arity must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DataManagerError::InvalidArgument(format!(
                "row has {} values, dataset has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.values.push(value);
        }
        Ok(())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Values of the column called `name`, if present.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// The values of row `index` in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Iterates over all rows in order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.num_rows()).map(move |i| self.columns.iter().map(|c| &c.values[i]).collect())
    }

    /// Splits the rows into contiguous chunks of at most `size` rows.
    ///
    /// Chunks cover every row exactly once in original order; only the last
    /// one may be shorter than `size`.
    pub fn chunks(&self, size: usize) -> Result<Chunks<'_>> {
        if size == 0 {
            return Err(DataManagerError::InvalidArgument(
                "chunk size must be a positive integer".to_string(),
            ));
        }
        Ok(Chunks {
            dataset: self,
            size,
            next_start: 0,
        })
    }

    /// Renders rows as a JSON array of objects keyed by column name.
    pub fn to_json_records(&self) -> Result<String> {
        let mut records = Vec::with_capacity(self.num_rows());
        for row in self.rows() {
            let mut record = serde_json::Map::new();
            for (column, value) in self.columns.iter().zip(row) {
                record.insert(column.name.clone(), serde_json::to_value(value)?);
            }
            records.push(serde_json::Value::Object(record));
        }
        Ok(serde_json::to_string(&records)?)
    }

    /// Parses a JSON array of objects, one object per row.
    ///
    /// Columns are the union of every record's keys in the order they are
    /// first seen; a key missing from a record reads as null.
    ///
    /// # Errors
    ///
    /// `Json` if the text is not an array of objects, `InvalidArgument` if a
    /// value is an array or object.
    pub fn from_json_records(text: &str) -> Result<Self> {
        let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(text)?;

        let mut names: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let mut dataset = Dataset::from_columns(
            names
                .iter()
                .map(|name| (name.clone(), Vec::with_capacity(records.len())))
                .collect(),
        )?;
        for record in &records {
            let mut row = Vec::with_capacity(names.len());
            for name in &names {
                row.push(match record.get(name) {
                    Some(value) => json_scalar(value)?,
                    None => Value::Null,
                });
            }
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }
}

/// Iterator over the chunks of a dataset.
#[derive(Debug)]
pub struct Chunks<'a> {
    dataset: &'a Dataset,
    size: usize,
    next_start: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.dataset.num_rows();
        if self.next_start >= total {
            return None;
        }
        let start = self.next_start;
        let len = self.size.min(total - start);
        self.next_start += len;
        Some(Chunk {
            dataset: self.dataset,
            start,
            len,
        })
    }
}

/// A contiguous run of dataset rows.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    dataset: &'a Dataset,
    start: usize,
    len: usize,
}

impl<'a> Chunk<'a> {
    /// Index of the first row of this chunk within the dataset.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn num_columns(&self) -> usize {
        self.dataset.num_columns()
    }

    /// Rows of this chunk, each in column order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&'a Value>> + 'a {
        let dataset = self.dataset;
        (self.start..self.start + self.len)
            .map(move |i| dataset.columns.iter().map(|c| &c.values[i]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: i64) -> Dataset {
        Dataset::from_columns(vec![
            ("id".to_string(), (0..n).map(Value::from).collect()),
            (
                "value".to_string(),
                (0..n).map(|i| Value::from(format!("v{}", i))).collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let result = Dataset::from_columns(vec![
            ("id".to_string(), vec![]),
            ("id".to_string(), vec![]),
        ]);
        assert!(matches!(result, Err(DataManagerError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_misaligned_columns() {
        let result = Dataset::from_columns(vec![
            ("id".to_string(), vec![Value::from(1)]),
            ("value".to_string(), vec![]),
        ]);
        assert!(matches!(result, Err(DataManagerError::InvalidArgument(_))));
    }

    #[test]
    fn test_from_rows_and_access() {
        let data = Dataset::from_rows(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::from(1), Value::from("a")],
                vec![Value::from(2), Value::Null],
            ],
        )
        .unwrap();

        assert_eq!(data.num_rows(), 2);
        assert_eq!(data.column_names(), vec!["id", "name"]);
        assert_eq!(data.row(1).unwrap(), vec![&Value::Integer(2), &Value::Null]);
        assert!(data.row(2).is_none());
        assert_eq!(data.column("name").unwrap()[0], Value::from("a"));
    }

    #[test]
    fn test_push_row_checks_arity() {
        let mut data = numbered(0);
        assert!(data.push_row(vec![Value::from(1)]).is_err());
        assert!(data.push_row(vec![Value::from(1), Value::from("x")]).is_ok());
        assert_eq!(data.num_rows(), 1);
    }

    #[test]
    fn test_chunk_sizes() {
        let data = numbered(25);
        let sizes: Vec<usize> = data.chunks(10).unwrap().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        let exact: Vec<usize> = numbered(20).chunks(10).unwrap().map(|c| c.len()).collect();
        assert_eq!(exact, vec![10, 10]);
    }

    #[test]
    fn test_chunks_preserve_row_order() {
        let data = numbered(7);
        let ids: Vec<i64> = data
            .chunks(3)
            .unwrap()
            .flat_map(|chunk| chunk.rows().map(|row| row[0].as_i64().unwrap()).collect::<Vec<_>>())
            .collect();
        assert_eq!(ids, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(numbered(3).chunks(0).is_err());
        assert_eq!(numbered(0).chunks(5).unwrap().count(), 0);
    }

    #[test]
    fn test_json_records() {
        let data = Dataset::from_rows(
            vec!["id".to_string(), "price".to_string(), "ticker".to_string()],
            vec![vec![Value::from(1), Value::from(10.5), Value::from("AAPL")]],
        )
        .unwrap();
        assert_eq!(
            data.to_json_records().unwrap(),
            r#"[{"id":1,"price":10.5,"ticker":"AAPL"}]"#
        );
    }

    #[test]
    fn test_from_json_records() {
        let data = Dataset::from_json_records(
            r#"[{"id": 1, "price": 10.5, "ticker": "AAPL"}, {"id": 2, "halted": true}]"#,
        )
        .unwrap();

        assert_eq!(data.column_names(), vec!["id", "price", "ticker", "halted"]);
        assert_eq!(
            data.row(1).unwrap(),
            vec![&Value::Integer(2), &Value::Null, &Value::Null, &Value::Bool(true)]
        );
        assert_eq!(data.column("price").unwrap()[0], Value::Real(10.5));
    }

    #[test]
    fn test_from_json_records_rejects_non_records() {
        let nested = Dataset::from_json_records(r#"[{"id": [1, 2]}]"#).unwrap_err();
        assert!(matches!(nested, DataManagerError::InvalidArgument(_)));

        let scalar = Dataset::from_json_records("[1, 2]").unwrap_err();
        assert!(matches!(scalar, DataManagerError::Json(_)));
    }
}
