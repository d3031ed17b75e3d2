/// Query Execution Module
///
/// Parameterized reads materialized eagerly into a `Dataset`.
use crate::core::db::engine::{Engine, NamedParams};
use crate::core::Result;
use crate::dataset::Dataset;
use tracing::debug;

/// Executes a read-only statement and returns every row it produces.
///
/// # Arguments
///
/// * `sql` - Statement text with `:name` placeholders
/// * `engine` - Caller-owned connection
/// * `params` - Values for the placeholders
///
/// # Returns
///
/// A dataset whose column names come from the result metadata, with repeated
/// names suffixed `_1`, `_2`, ... in result order. A statement matching
/// nothing returns a dataset with zero rows and no columns.
///
/// # Errors
///
/// Any driver failure propagates as a database error.
pub fn query<E: Engine>(sql: &str, engine: &mut E, params: &NamedParams) -> Result<Dataset> {
    let data = engine.fetch(sql, params)?;
    debug!(rows = data.num_rows(), columns = data.num_columns(), "query returned");
    Ok(data)
}
