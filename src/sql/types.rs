//! SQL column type to value type mapping.

use super::Dialect;
use crate::value::ValueType;

/// Map a declared SQL column type to the value type its literals load as.
pub fn map_type(sql_type: &str, dialect: Dialect) -> ValueType {
    let lower = sql_type.to_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();

    match dialect {
        Dialect::PostgreSQL => map_postgres_type(base),
        Dialect::MySQL => map_mysql_type(base, &lower),
        _ => map_generic_type(base),
    }
}

fn map_postgres_type(base: &str) -> ValueType {
    match base {
        "int" | "int4" | "integer" | "serial" | "serial4" | "bigint" | "int8" | "bigserial"
        | "serial8" | "smallint" | "int2" | "smallserial" | "serial2" => ValueType::Int,
        "real" | "float4" | "double precision" | "doubleprecision" | "float8" | "decimal"
        | "numeric" | "money" => ValueType::Float,
        "timestamp" | "timestamptz" | "timestamp with time zone"
        | "timestamp without time zone" => ValueType::Timestamp,
        "date" => ValueType::Date,
        _ => ValueType::Text,
    }
}

fn map_mysql_type(base: &str, full: &str) -> ValueType {
    match base {
        "int" | "integer" | "bigint" | "smallint" | "mediumint" | "year" => ValueType::Int,
        // TINYINT(1) is a boolean and stays numeric as 0/1.
        "tinyint" if full.contains("tinyint(1)") => ValueType::Int,
        "tinyint" => ValueType::Int,
        "float" | "double" | "decimal" | "numeric" => ValueType::Float,
        "datetime" | "timestamp" => ValueType::Timestamp,
        "date" => ValueType::Date,
        _ => ValueType::Text,
    }
}

fn map_generic_type(base: &str) -> ValueType {
    match base {
        "int" | "integer" | "bigint" | "smallint" | "tinyint" | "hugeint" => ValueType::Int,
        "real" | "float" | "double" | "double precision" | "doubleprecision" | "decimal"
        | "numeric" => ValueType::Float,
        "timestamp" | "datetime" => ValueType::Timestamp,
        "date" => ValueType::Date,
        _ => ValueType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_types() {
        assert_eq!(map_type("SERIAL", Dialect::PostgreSQL), ValueType::Int);
        assert_eq!(map_type("VARCHAR(255)", Dialect::PostgreSQL), ValueType::Text);
        assert_eq!(map_type("NUMERIC(12,2)", Dialect::PostgreSQL), ValueType::Float);
        assert_eq!(map_type("TIMESTAMPTZ", Dialect::PostgreSQL), ValueType::Timestamp);
    }

    #[test]
    fn test_mysql_types() {
        assert_eq!(map_type("INT", Dialect::MySQL), ValueType::Int);
        assert_eq!(map_type("TINYINT(1)", Dialect::MySQL), ValueType::Int);
        assert_eq!(map_type("DATETIME", Dialect::MySQL), ValueType::Timestamp);
        assert_eq!(map_type("DATE", Dialect::MySQL), ValueType::Date);
    }

    #[test]
    fn test_generic_types() {
        assert_eq!(map_type("DOUBLE", Dialect::Generic), ValueType::Float);
        assert_eq!(map_type("TEXT", Dialect::Generic), ValueType::Text);
    }
}
