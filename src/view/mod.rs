//! Derived views: filters and computed columns over query results.

mod derive;
mod filter;

pub use derive::{compute_derived, group_sum, monthly_sum, today, two_stage_stats, DerivedRule};
pub use filter::{filter, select_columns, top_n, Predicate};

use crate::table::TableError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ViewError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Column {column} holds non-numeric value {value:?}")]
    NotNumeric { column: String, value: String },
    #[error("Column {column} holds non-date value {value:?}")]
    NotDate { column: String, value: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

impl ViewError {
    fn not_numeric(column: &str, value: &crate::value::Value) -> Self {
        ViewError::NotNumeric {
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

/// Map a missing-column table error onto the view's own variant.
fn require<'t>(table: &'t crate::table::Table, name: &str) -> Result<&'t crate::table::Column, ViewError> {
    table
        .column(name)
        .ok_or_else(|| ViewError::UnknownColumn(name.to_string()))
}
