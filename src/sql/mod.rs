//! SQL fixture loading and query compilation.

mod compile;
mod dialect;
mod lexer;
mod parser;
mod types;

pub use compile::{compile, CompiledQuery};
pub use dialect::Dialect;
pub use parser::{parse_sql, FixtureTable, SqlParseError};
