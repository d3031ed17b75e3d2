/// # Test Utilities Module
///
/// In-memory SQLite fixtures that emulate the PostgreSQL catalog, so catalog
/// resolution and bulk writes run their PostgreSQL statements in tests.
///
/// The fixture attaches two extra in-memory databases named
/// `information_schema` and `pg_catalog` holding the catalog tables the
/// resolver reads, and one attached database per user schema.
use crate::catalog::quote_identifier;
use crate::core::db::connection::connect;
use crate::core::db::{CatalogDialect, Engine, NamedParams};
use crate::core::Result;
use crate::dataset::Dataset;
use rusqlite::{params, Connection, Transaction};

/// A SQLite connection that answers catalog lookups the PostgreSQL way.
pub struct EmulatedPostgres {
    connection: Connection,
}

impl Engine for EmulatedPostgres {
    type Session<'s> = Transaction<'s>;

    fn dialect(&self) -> CatalogDialect {
        CatalogDialect::Postgres
    }

    fn fetch(&mut self, sql: &str, params: &NamedParams) -> Result<Dataset> {
        self.connection.fetch(sql, params)
    }

    fn begin(&mut self) -> Result<Self::Session<'_>> {
        self.connection.begin()
    }
}

/// In-memory database with an emulated catalog.
pub struct CatalogFixture {
    engine: EmulatedPostgres,
}

impl CatalogFixture {
    /// Creates a fixture with empty catalog tables.
    pub fn new() -> Result<Self> {
        let connection = connect(":memory:")?;
        connection.execute_batch(
            "
            ATTACH DATABASE ':memory:' AS information_schema;
            ATTACH DATABASE ':memory:' AS pg_catalog;

            CREATE TABLE information_schema.schemata (
                schema_name TEXT NOT NULL
            );
            CREATE TABLE information_schema.tables (
                table_schema TEXT NOT NULL,
                table_name TEXT NOT NULL,
                table_type TEXT NOT NULL
            );
            CREATE TABLE information_schema.columns (
                table_schema TEXT NOT NULL,
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                ordinal_position INTEGER NOT NULL
            );
            CREATE TABLE pg_catalog.pg_namespace (
                oid INTEGER PRIMARY KEY,
                nspname TEXT NOT NULL UNIQUE
            );
            CREATE TABLE pg_catalog.pg_proc (
                oid INTEGER PRIMARY KEY,
                proname TEXT NOT NULL,
                pronamespace INTEGER NOT NULL,
                prokind TEXT NOT NULL
            );

            INSERT INTO information_schema.schemata VALUES ('information_schema'), ('pg_catalog');
            INSERT INTO pg_catalog.pg_namespace (nspname) VALUES ('information_schema'), ('pg_catalog');
        ",
        )?;

        Ok(CatalogFixture {
            engine: EmulatedPostgres { connection },
        })
    }

    /// The raw connection, for arranging data behind the catalog's back.
    pub fn connection(&self) -> &Connection {
        &self.engine.connection
    }

    /// The engine every primitive under test runs against.
    pub fn connection_mut(&mut self) -> &mut EmulatedPostgres {
        &mut self.engine
    }

    /// Attaches a new schema and registers it in the catalog.
    pub fn create_schema(&mut self, schema: &str) -> Result<()> {
        self.engine.connection.execute_batch(&format!(
            "ATTACH DATABASE ':memory:' AS {}",
            quote_identifier(schema)
        ))?;
        self.engine.connection.execute(
            "INSERT INTO information_schema.schemata (schema_name) VALUES (?1)",
            params![schema],
        )?;
        self.engine.connection.execute(
            "INSERT INTO pg_catalog.pg_namespace (nspname) VALUES (?1)",
            params![schema],
        )?;
        Ok(())
    }

    /// Creates a base table in an attached schema and registers it and its
    /// columns in the catalog.
    pub fn create_table(&mut self, schema: &str, table: &str, columns: &[(&str, &str)]) -> Result<()> {
        let definitions: Vec<String> = columns
            .iter()
            .map(|(name, sql_type)| format!("{} {}", quote_identifier(name), sql_type))
            .collect();
        self.engine.connection.execute_batch(&format!(
            "CREATE TABLE {}.{} ({})",
            quote_identifier(schema),
            quote_identifier(table),
            definitions.join(", ")
        ))?;
        self.register_table(schema, table, "BASE TABLE")?;
        for (position, (name, _)) in columns.iter().enumerate() {
            self.engine.connection.execute(
                "INSERT INTO information_schema.columns VALUES (?1, ?2, ?3, ?4)",
                params![schema, table, name, position as i64 + 1],
            )?;
        }
        Ok(())
    }

    /// Registers a view; views are never valid bulk-write targets.
    pub fn create_view(&mut self, schema: &str, view: &str) -> Result<()> {
        self.register_table(schema, view, "VIEW")
    }

    /// Registers a base table under a system schema without creating it.
    pub fn register_system_table(&mut self, schema: &str, table: &str) -> Result<()> {
        self.register_table(schema, table, "BASE TABLE")
    }

    /// Registers a stored procedure in `schema`.
    pub fn register_procedure(&mut self, schema: &str, name: &str) -> Result<()> {
        self.engine.connection.execute(
            "INSERT INTO pg_catalog.pg_proc (proname, pronamespace, prokind)
             SELECT ?1, oid, 'p' FROM pg_catalog.pg_namespace WHERE nspname = ?2",
            params![name, schema],
        )?;
        Ok(())
    }

    /// Number of rows currently in `schema.table`.
    pub fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        Ok(self.engine.connection.query_row(
            &format!(
                "SELECT COUNT(*) FROM {}.{}",
                quote_identifier(schema),
                quote_identifier(table)
            ),
            [],
            |row| row.get(0),
        )?)
    }

    fn register_table(&mut self, schema: &str, table: &str, table_type: &str) -> Result<()> {
        self.engine.connection.execute(
            "INSERT INTO information_schema.tables VALUES (?1, ?2, ?3)",
            params![schema, table, table_type],
        )?;
        Ok(())
    }
}
