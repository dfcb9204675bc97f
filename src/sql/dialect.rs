//! SQL dialect detection and the per-dialect bits of compiled queries.

/// SQL dialect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Auto-detect from script content
    #[default]
    Auto,
    /// Standard SQL
    Generic,
    /// PostgreSQL
    PostgreSQL,
    /// MySQL
    MySQL,
    /// DuckDB
    DuckDB,
}

impl Dialect {
    /// Parse dialect from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "generic" => Some(Self::Generic),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            "duckdb" => Some(Self::DuckDB),
            _ => None,
        }
    }

    /// Detect dialect from SQL content.
    pub fn detect(content: &str) -> Self {
        let lower = content.to_lowercase();

        if lower.contains("postgresql database dump")
            || lower.contains("pg_dump")
            || lower.contains("-- postgres")
        {
            return Self::PostgreSQL;
        }
        if lower.contains("mysql dump")
            || lower.contains("mysqldump")
            || lower.contains("-- mysql")
        {
            return Self::MySQL;
        }
        if lower.contains("-- duckdb") {
            return Self::DuckDB;
        }

        if lower.contains("serial")
            || lower.contains("::text")
            || lower.contains("timestamptz")
        {
            return Self::PostgreSQL;
        }
        if lower.contains("auto_increment")
            || lower.contains("tinyint")
            || lower.contains("engine=")
            || lower.contains("unsigned")
        {
            return Self::MySQL;
        }

        Self::Generic
    }

    /// Resolve Auto to a concrete dialect.
    pub fn resolve(self, content: &str) -> Self {
        match self {
            Self::Auto => Self::detect(content),
            other => other,
        }
    }

    /// Cast used before dividing integer aggregates.
    pub fn decimal_cast(self, expr: &str) -> String {
        match self {
            // ROUND(x, n) on PostgreSQL exists for numeric only.
            Self::PostgreSQL => format!("CAST({} AS NUMERIC)", expr),
            Self::MySQL => format!("CAST({} AS DECIMAL(38, 10))", expr),
            _ => format!("CAST({} AS DOUBLE)", expr),
        }
    }

    /// Placeholder for the `n`-th (1-based) bound parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", n),
            _ => "?".to_string(),
        }
    }

    /// Whether `ORDER BY ... NULLS LAST` is accepted.
    pub fn supports_nulls_last(self) -> bool {
        !matches!(self, Self::MySQL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_postgres() {
        let sql = "-- PostgreSQL database dump\nCREATE TABLE recipe_table (recipe_id SERIAL);";
        assert_eq!(Dialect::detect(sql), Dialect::PostgreSQL);
    }

    #[test]
    fn test_detect_mysql() {
        let sql = "-- MySQL dump\nCREATE TABLE customers (customer_id INT AUTO_INCREMENT);";
        assert_eq!(Dialect::detect(sql), Dialect::MySQL);
    }

    #[test]
    fn test_detect_generic() {
        let sql = "CREATE TABLE products (product_id INTEGER PRIMARY KEY);";
        assert_eq!(Dialect::detect(sql), Dialect::Generic);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::PostgreSQL.placeholder(1), "$1");
        assert_eq!(Dialect::DuckDB.placeholder(1), "?");
        assert!(!Dialect::MySQL.supports_nulls_last());
    }
}
