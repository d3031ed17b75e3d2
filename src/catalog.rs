/// Catalog Resolution Module
///
/// Confirms that a schema, table or stored procedure exists before any
/// statement names it. Lookups go through the engine's own catalog with
/// lower-cased inputs, and only names returned by the catalog are ever placed
/// into SQL text.
///
/// PostgreSQL engines are read through `information_schema` and `pg_catalog`.
/// SQLite treats every attached database as a schema and has no stored
/// procedures.
use crate::core::db::{query, CatalogDialect, Engine, NamedParams};
use crate::core::{DataManagerError, ObjectKind, Result};
use crate::dataset::Dataset;
use std::fmt;
use tracing::debug;

const SCHEMA_EXISTS: &str = "SELECT schema_name \
     FROM information_schema.schemata \
     WHERE lower(schema_name) = :schema \
     ORDER BY schema_name";

const TABLE_IN_SCHEMA: &str = "SELECT table_schema AS schema_name, table_name AS object_name, \
     table_schema || '.' || table_name AS full_name \
     FROM information_schema.tables \
     WHERE table_type = 'BASE TABLE' \
     AND table_schema NOT IN ('pg_catalog', 'information_schema') \
     AND lower(table_name) = :object \
     AND lower(table_schema) = :schema \
     ORDER BY table_schema, table_name";

const TABLE_ANY_SCHEMA: &str = "SELECT table_schema AS schema_name, table_name AS object_name, \
     table_schema || '.' || table_name AS full_name \
     FROM information_schema.tables \
     WHERE table_type = 'BASE TABLE' \
     AND table_schema NOT IN ('pg_catalog', 'information_schema') \
     AND lower(table_name) = :object \
     ORDER BY table_schema, table_name";

const PROCEDURE_IN_SCHEMA: &str = "SELECT n.nspname AS schema_name, p.proname AS object_name, \
     n.nspname || '.' || p.proname AS full_name \
     FROM pg_catalog.pg_proc p \
     JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace \
     WHERE p.prokind = 'p' \
     AND lower(p.proname) = :object \
     AND lower(n.nspname) = :schema \
     ORDER BY n.nspname, p.proname";

const PROCEDURE_ANY_SCHEMA: &str = "SELECT n.nspname AS schema_name, p.proname AS object_name, \
     n.nspname || '.' || p.proname AS full_name \
     FROM pg_catalog.pg_proc p \
     JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace \
     WHERE p.prokind = 'p' \
     AND lower(p.proname) = :object \
     ORDER BY n.nspname, p.proname";

const TABLE_COLUMNS: &str = "SELECT column_name \
     FROM information_schema.columns \
     WHERE table_schema = :schema AND table_name = :object \
     ORDER BY ordinal_position";

const SQLITE_SCHEMA_EXISTS: &str = "SELECT name AS schema_name \
     FROM pragma_database_list \
     WHERE lower(name) = :schema \
     ORDER BY name";

const SQLITE_SCHEMAS: &str = "SELECT name AS schema_name \
     FROM pragma_database_list \
     ORDER BY name";

const SQLITE_TABLE_COLUMNS: &str = "SELECT name AS column_name \
     FROM pragma_table_info(:object, :schema) \
     ORDER BY cid";

/// Base tables of one attached database, skipping SQLite's internal tables.
///
/// `schema` must be a catalog spelling.
fn sqlite_tables_in(schema: &str) -> String {
    format!(
        "SELECT :schema AS schema_name, name AS object_name, \
         :schema || '.' || name AS full_name \
         FROM {}.sqlite_master \
         WHERE type = 'table' \
         AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
         AND lower(name) = :object \
         ORDER BY name",
        quote_identifier(schema)
    )
}

/// Identifies a catalog object before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub object_name: String,
    pub schema_name: Option<String>,
    pub is_table: bool,
}

impl ObjectDescriptor {
    pub fn table(object_name: &str, schema_name: Option<&str>) -> Self {
        ObjectDescriptor {
            object_name: object_name.to_string(),
            schema_name: schema_name.map(str::to_string),
            is_table: true,
        }
    }

    pub fn procedure(object_name: &str, schema_name: Option<&str>) -> Self {
        ObjectDescriptor {
            object_name: object_name.to_string(),
            schema_name: schema_name.map(str::to_string),
            is_table: false,
        }
    }

    fn kind(&self) -> ObjectKind {
        if self.is_table {
            ObjectKind::Table
        } else {
            ObjectKind::Procedure
        }
    }
}

/// A catalog-confirmed `schema.object` name.
///
/// Every part is spelled exactly as the catalog returned it, and `Display`
/// prints the catalog's fully-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedName {
    schema: String,
    object: String,
    full_name: String,
}

impl ResolvedName {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// `"schema"."object"`, safe to splice into statement text.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(&self.object))
    }
}

impl fmt::Display for ResolvedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Wraps an identifier in double quotes, doubling any embedded quote.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Resolves a table (`is_table`) or stored procedure to its qualified name.
///
/// Comparison is case-insensitive. When `schema_name` is given it must exist
/// on its own before the object lookup runs; without it every non-system
/// schema is searched and the first match in schema order wins.
///
/// # Errors
///
/// * `InvalidArgument` if `object_name` is empty
/// * `NotFound` naming the schema or the object
/// * Database errors from the introspection queries
pub fn resolve<E: Engine>(
    object_name: &str,
    engine: &mut E,
    schema_name: Option<&str>,
    is_table: bool,
) -> Result<ResolvedName> {
    let descriptor = ObjectDescriptor {
        object_name: object_name.to_string(),
        schema_name: schema_name.map(str::to_string),
        is_table,
    };
    resolve_descriptor(&descriptor, engine)
}

/// Resolves a descriptor. See [`resolve`].
pub fn resolve_descriptor<E: Engine>(
    descriptor: &ObjectDescriptor,
    engine: &mut E,
) -> Result<ResolvedName> {
    if descriptor.object_name.trim().is_empty() {
        return Err(DataManagerError::InvalidArgument(
            "object name must not be empty".to_string(),
        ));
    }

    let schema = match &descriptor.schema_name {
        Some(schema_name) => Some(find_schema(engine, schema_name)?.ok_or_else(|| {
            DataManagerError::not_found(ObjectKind::Schema, schema_name.as_str())
        })?),
        None => None,
    };

    let object = descriptor.object_name.to_lowercase();
    let found = match engine.dialect() {
        CatalogDialect::Postgres => {
            find_postgres_object(engine, &object, schema.as_deref(), descriptor.is_table)?
        }
        CatalogDialect::Sqlite if descriptor.is_table => {
            find_sqlite_table(engine, &object, schema.as_deref())?
        }
        CatalogDialect::Sqlite => None,
    };
    let resolved = found.ok_or_else(|| {
        DataManagerError::not_found(descriptor.kind(), descriptor.object_name.as_str())
    })?;

    debug!(kind = %descriptor.kind(), resolved = %resolved, "resolved catalog object");
    Ok(resolved)
}

/// Returns the catalog spelling of `schema_name`, if the schema exists.
fn find_schema<E: Engine>(engine: &mut E, schema_name: &str) -> Result<Option<String>> {
    let sql = match engine.dialect() {
        CatalogDialect::Postgres => SCHEMA_EXISTS,
        CatalogDialect::Sqlite => SQLITE_SCHEMA_EXISTS,
    };
    let params = NamedParams::new().bind("schema", schema_name.to_lowercase());
    let rows = query(sql, engine, &params)?;
    Ok(text_column(&rows, "schema_name").into_iter().next())
}

fn find_postgres_object<E: Engine>(
    engine: &mut E,
    object: &str,
    schema: Option<&str>,
    is_table: bool,
) -> Result<Option<ResolvedName>> {
    let mut params = NamedParams::new().bind("object", object);
    let sql = match schema {
        Some(schema) => {
            params = params.bind("schema", schema.to_lowercase());
            if is_table {
                TABLE_IN_SCHEMA
            } else {
                PROCEDURE_IN_SCHEMA
            }
        }
        None if is_table => TABLE_ANY_SCHEMA,
        None => PROCEDURE_ANY_SCHEMA,
    };
    Ok(first_resolved(&query(sql, engine, &params)?))
}

/// Searches one attached database, or every one in name order.
fn find_sqlite_table<E: Engine>(
    engine: &mut E,
    object: &str,
    schema: Option<&str>,
) -> Result<Option<ResolvedName>> {
    let schemas = match schema {
        Some(schema) => vec![schema.to_string()],
        None => text_column(&query(SQLITE_SCHEMAS, engine, &NamedParams::new())?, "schema_name"),
    };
    for schema in schemas {
        let params = NamedParams::new()
            .bind("schema", schema.as_str())
            .bind("object", object);
        let rows = query(&sqlite_tables_in(&schema), engine, &params)?;
        if let Some(resolved) = first_resolved(&rows) {
            return Ok(Some(resolved));
        }
    }
    Ok(None)
}

fn text_column(rows: &Dataset, column: &str) -> Vec<String> {
    rows.column(column)
        .unwrap_or(&[])
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect()
}

fn first_resolved(rows: &Dataset) -> Option<ResolvedName> {
    let text_at = |column: &str| text_column(rows, column).into_iter().next();
    Some(ResolvedName {
        schema: text_at("schema_name")?,
        object: text_at("object_name")?,
        full_name: text_at("full_name")?,
    })
}

/// Maps requested column names onto the catalog spelling of the resolved
/// table's columns, case-insensitively and in the requested order.
///
/// # Errors
///
/// `InvalidArgument` if a requested column does not exist on the table or
/// appears twice.
pub fn resolve_columns<E: Engine, S: AsRef<str>>(
    table: &ResolvedName,
    engine: &mut E,
    requested: &[S],
) -> Result<Vec<String>> {
    let sql = match engine.dialect() {
        CatalogDialect::Postgres => TABLE_COLUMNS,
        CatalogDialect::Sqlite => SQLITE_TABLE_COLUMNS,
    };
    let params = NamedParams::new()
        .bind("schema", table.schema())
        .bind("object", table.object());
    let known = text_column(&query(sql, engine, &params)?, "column_name");

    let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        let name = name.as_ref();
        let wanted = name.to_lowercase();
        let column = known
            .iter()
            .find(|known| known.to_lowercase() == wanted)
            .ok_or_else(|| {
                DataManagerError::InvalidArgument(format!(
                    "column `{}` does not exist on {}",
                    name, table
                ))
            })?;
        if resolved.contains(column) {
            return Err(DataManagerError::InvalidArgument(format!(
                "column `{}` is listed more than once",
                name
            )));
        }
        resolved.push(column.clone());
    }
    Ok(resolved)
}
