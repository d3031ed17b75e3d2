/// Database Module
///
/// This module provides the database layer of the data manager,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Driver Seam** (`engine.rs`): the `Engine`/`Session` traits every driver implements
/// - **Connection** (`connection.rs`): the rusqlite implementation of that seam, answering
///   catalog lookups from SQLite's own catalog
/// - **Query Execution** (`query.rs`): parameterized reads materialized as a `Dataset`
/// - **Statement Execution** (`statement.rs`): transactional non-returning statements
///
/// ## Error Handling
///
/// Reads propagate `DataManagerError`. The statement runner is the one place
/// where failures are absorbed, into an `ExecutionOutcome`.
pub mod connection;
pub mod engine;
pub mod query;
pub mod statement;

pub use connection::*;
pub use engine::*;
pub use query::*;
pub use statement::*;
