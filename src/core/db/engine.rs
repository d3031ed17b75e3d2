/// Driver Seam Module
///
/// Every data-access primitive takes a caller-owned `Engine`. The engine
/// runs row-returning statements directly and opens a `Session` for
/// statements that must commit or roll back.
use crate::core::Result;
use crate::dataset::{Chunk, Dataset, Value};

/// Named parameters bound to `:name` placeholders.
///
/// Names are stored without the leading colon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams {
    entries: Vec<(String, Value)>,
}

impl NamedParams {
    pub fn new() -> Self {
        NamedParams::default()
    }

    /// Adds a binding, replacing any earlier value for the same name.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        let name = name.trim_start_matches(':');
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for NamedParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(NamedParams::new(), |params, (k, v)| params.bind(k.as_ref(), v))
    }
}

/// The catalog an engine answers introspection queries from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogDialect {
    /// `information_schema` views and `pg_catalog` tables
    Postgres,
    /// `pragma_database_list`, per-schema `sqlite_master` and `pragma_table_info`
    Sqlite,
}

/// An open path to a database, owned by the caller.
///
/// Implementations scope every cursor they open to the call that opened it.
pub trait Engine {
    type Session<'s>: Session
    where
        Self: 's;

    /// Which catalog queries this engine understands.
    fn dialect(&self) -> CatalogDialect;

    /// Executes a row-returning statement and materializes every row.
    ///
    /// Column names come from the statement metadata. A statement matching
    /// nothing yields an empty dataset with no columns.
    fn fetch(&mut self, sql: &str, params: &NamedParams) -> Result<Dataset>;

    /// Opens a transactional session.
    fn begin(&mut self) -> Result<Self::Session<'_>>;
}

/// A transaction in progress.
///
/// Dropping a session without committing rolls it back.
pub trait Session {
    /// Executes a non-returning statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<usize>;

    /// Executes `sql` once per row of `chunk` with a single prepared statement.
    ///
    /// Row values bind to the statement's placeholders in column order.
    fn execute_batch(&mut self, sql: &str, chunk: &Chunk<'_>) -> Result<usize>;

    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_strips_colon_and_replaces() {
        let params = NamedParams::new()
            .bind(":schema", "datafeeds")
            .bind("schema", "public")
            .bind("limit", 10);

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("schema"), Some(&Value::from("public")));
        assert_eq!(params.get("limit"), Some(&Value::Integer(10)));
    }

    #[test]
    fn test_collect_params() {
        let params: NamedParams = vec![("a", 1), ("b", 2)].into_iter().collect();
        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
