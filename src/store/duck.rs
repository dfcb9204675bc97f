//! Embedded DuckDB store.

use super::{Connection, Store, StoreError};
use crate::aggregate::{AggregationSpec, QueryParams};
use crate::sql::{compile, Dialect};
use crate::table::Table;
use crate::value::Value;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, warn};

/// A DuckDB database with a small pool of connections.
///
/// Idle connections are reused; one that is checked out belongs to exactly
/// one request until its handle drops.
pub struct DuckStore {
    label: String,
    /// Origin every pooled connection is cloned from.
    origin: Mutex<duckdb::Connection>,
    idle: Mutex<Vec<duckdb::Connection>>,
    max_idle: usize,
}

impl DuckStore {
    const DEFAULT_MAX_IDLE: usize = 4;

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = duckdb::Connection::open(path)
            .map_err(|e| StoreError::Unreachable(format!("{}: {}", path.display(), e)))?;
        Ok(Self::with_origin(path.display().to_string(), conn))
    }

    /// A throwaway in-memory database filled from a fixture script.
    pub fn scratch(fixture: &str) -> Result<Self, StoreError> {
        let conn = duckdb::Connection::open_in_memory()
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        conn.execute_batch(fixture)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self::with_origin(":memory:".to_string(), conn))
    }

    fn with_origin(label: String, conn: duckdb::Connection) -> Self {
        Self {
            label,
            origin: Mutex::new(conn),
            idle: Mutex::new(Vec::new()),
            max_idle: Self::DEFAULT_MAX_IDLE,
        }
    }

    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, conn: duckdb::Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }
}

impl Store for DuckStore {
    fn describe(&self) -> String {
        format!("duckdb ({})", self.label)
    }

    fn acquire(&self) -> Result<Box<dyn Connection + '_>, StoreError> {
        let pooled = self.idle.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => self
                .origin
                .lock()
                .try_clone()
                .map_err(|e| StoreError::NoConnection(e.to_string()))?,
        };
        Ok(Box::new(DuckConnection {
            store: self,
            conn: Some(conn),
        }))
    }
}

struct DuckConnection<'a> {
    store: &'a DuckStore,
    conn: Option<duckdb::Connection>,
}

impl Drop for DuckConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.release(conn);
        }
    }
}

impl Connection for DuckConnection<'_> {
    fn run(&mut self, spec: &AggregationSpec, params: &QueryParams) -> Result<Table, StoreError> {
        spec.validate()?;
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| StoreError::NoConnection("connection already released".to_string()))?;
        let query = compile(spec, params, Dialect::DuckDB);
        debug!(spec = %spec.name, sql = %query.sql, "running on duckdb");

        let mut stmt = conn.prepare(&query.sql).map_err(|e| {
            warn!(spec = %spec.name, error = %e, "prepare failed");
            StoreError::Database(e.to_string())
        })?;
        let bound: Vec<duckdb::types::Value> = query.params.iter().map(to_duck).collect();
        let mut result = stmt
            .query(duckdb::params_from_iter(bound))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let width = spec.output_columns().len();
        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let cell = row
                    .get_ref(i)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                values.push(from_duck(cell));
            }
            rows.push(values);
        }
        drop(result);

        let names = spec.output_columns();
        if rows.is_empty() {
            return Ok(Table::empty(&names));
        }
        Ok(Table::from_rows(&names, rows)?)
    }
}

fn to_duck(value: &Value) -> duckdb::types::Value {
    match value {
        Value::Null => duckdb::types::Value::Null,
        Value::Int(n) => duckdb::types::Value::BigInt(*n),
        Value::Float(f) => duckdb::types::Value::Double(*f),
        other => duckdb::types::Value::Text(other.to_string()),
    }
}

fn from_duck(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Int(b as i64),
        ValueRef::TinyInt(i) => Value::Int(i.into()),
        ValueRef::SmallInt(i) => Value::Int(i.into()),
        ValueRef::Int(i) => Value::Int(i.into()),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64)),
        ValueRef::UTinyInt(i) => Value::Int(i.into()),
        ValueRef::USmallInt(i) => Value::Int(i.into()),
        ValueRef::UInt(i) => Value::Int(i.into()),
        ValueRef::UBigInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64)),
        ValueRef::Float(f) => Value::Float(f.into()),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
            .map(Value::Date)
            .unwrap_or(Value::Null),
        ValueRef::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            DateTime::from_timestamp_micros(micros)
                .map(|dt| Value::Timestamp(dt.naive_utc()))
                .unwrap_or(Value::Null)
        }
        other => Value::Text(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{col, Aggregate, Limit};

    const FIXTURE: &str = "
        CREATE TABLE ingredient_table (ingredient_id INTEGER, ingredient_name VARCHAR);
        CREATE TABLE recipe_ingredient_table (recipe_ingredient_id INTEGER, recipe_id INTEGER, ingredient_id INTEGER);
        INSERT INTO ingredient_table VALUES (1, 'salt'), (2, 'sugar'), (3, 'pepper');
        INSERT INTO recipe_ingredient_table VALUES (1, 1, 1), (2, 2, 1), (3, 3, 1), (4, 1, 2), (5, 2, 2), (6, 1, 3);
    ";

    #[test]
    fn test_top_ingredients_on_duckdb() {
        let store = DuckStore::scratch(FIXTURE).unwrap();
        let spec = AggregationSpec::from_table("top_ingredients", "recipe_ingredient_table", "ri")
            .join("ingredient_table", "i", col("ri", "ingredient_id"), col("i", "ingredient_id"))
            .key(col("i", "ingredient_name"), "ingredient_name")
            .measure(Aggregate::Count, "usage_count")
            .rank_by("usage_count")
            .limit(Limit::Param { default: 10 });

        let table = {
            let mut conn = store.acquire().unwrap();
            conn.run(&spec, &QueryParams::with_limit(2)).unwrap()
        };
        assert_eq!(
            table.column("ingredient_name").unwrap().values,
            vec![Value::from("salt"), Value::from("sugar")]
        );
        assert_eq!(
            table.column("usage_count").unwrap().values,
            vec![Value::Int(3), Value::Int(2)]
        );
        assert_eq!(store.idle_connections(), 1);
    }

    #[test]
    fn test_missing_table_is_a_database_error() {
        let store = DuckStore::scratch(FIXTURE).unwrap();
        let spec = AggregationSpec::from_table("ghost", "nope", "n").key(col("n", "x"), "x");
        let mut conn = store.acquire().unwrap();
        assert!(matches!(
            conn.run(&spec, &QueryParams::default()),
            Err(StoreError::Database(_))
        ));
    }
}
