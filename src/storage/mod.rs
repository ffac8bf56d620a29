//! Storage Layer - SQLite-backed persistence
//!
//! System of record is a single append-only SQLite table:
//! - properties(key, value, value_order, value_type, secret, section,
//!   namespace, environment, revision, version, created, deleted)
//!
//! Rows are never updated or deleted. A property revision is stored as one
//! row per value; the history of an identity is every row sharing its
//! (key, namespace, environment).

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, DbStats};

use crate::property::{Property, Query};
use crate::Result;

/// Backend trait for property storage.
///
/// Implementations must be thread-safe; the service shares one instance
/// across every connection.
pub trait PropertyStorage: Send + Sync + 'static {
    /// Persist a property, returning it with `created` populated.
    fn store(&self, property: Property) -> Result<Property>;

    /// Find properties matching the query template.
    ///
    /// Returns [`crate::Error::NoRowsFound`] when nothing matches.
    fn search(&self, query: &Query) -> Result<Vec<Property>>;
}

/// Treat the "no rows" sentinel as an empty result.
pub fn no_rows_as_empty(result: Result<Vec<Property>>) -> Result<Vec<Property>> {
    match result {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}
