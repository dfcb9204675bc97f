//! Where aggregation specs run.
//!
//! A [`Store`] hands out one [`Connection`] per request. The connection is
//! released when the boxed handle is dropped, so a request can never keep a
//! store busy past its own scope.

mod memory;

#[cfg(feature = "duckdb")]
mod duck;

pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use crate::aggregate::{AggregationSpec, QueryParams, SpecError};
use crate::sql::SqlParseError;
use crate::table::{Table, TableError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unreachable(String),
    #[error("No connection available: {0}")]
    NoConnection(String),
    #[error("Missing table: {0}")]
    MissingTable(String),
    #[error("Missing column {column} in {table}")]
    MissingColumn { table: String, column: String },
    #[error("Column {0} is not numeric")]
    NotNumeric(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Fixture(#[from] SqlParseError),
}

/// A source of read-only connections.
pub trait Store {
    /// Short human-readable label, used in log lines.
    fn describe(&self) -> String;

    fn acquire(&self) -> Result<Box<dyn Connection + '_>, StoreError>;
}

/// One checked-out connection. Dropping it returns it to its store.
pub trait Connection {
    fn run(&mut self, spec: &AggregationSpec, params: &QueryParams) -> Result<Table, StoreError>;
}
