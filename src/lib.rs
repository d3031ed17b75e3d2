// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod catalog;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod connection_string;
pub mod dataset;
pub mod writer;

#[doc(hidden)]
pub mod test_utils;

pub use crate::catalog::{resolve, ObjectDescriptor, ResolvedName};
pub use crate::core::db::{
    connect, execute, query, CatalogDialect, Engine, ExecutionOutcome, NamedParams, Session,
};
pub use crate::core::{DataManagerError, Result};
pub use crate::dataset::{Dataset, Value};
pub use crate::writer::{write, CommitMode, WriteOptions, WriteReport};
