/// Core Module for the data manager
///
/// Shared infrastructure used by every data-access primitive: the error
/// taxonomy and the database layer (driver seam, query executor and
/// statement runner).

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DataManagerError, ObjectKind, Result};
