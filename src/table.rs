//! Columnar in-memory tables.

use crate::value::{Value, ValueType};
use std::cmp::Ordering;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TableError {
    #[error("Row {row} has columns {found:?}, expected {expected:?}")]
    ColumnMismatch {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Row {row} has {found} values for {expected} columns")]
    WidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Column {column} has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ValueType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = infer_type(&values);
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Non-null numeric values, in row order.
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(Value::as_f64)
    }
}

fn infer_type(values: &[Value]) -> ValueType {
    values
        .iter()
        .fold(ValueType::Null, |acc, v| acc.unify(v.value_type()))
}

/// A table of rows sharing one column list, stored column by column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.table
            .column(column)
            .map(|c| &c.values[self.index])
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `(column, value)` pairs in column order.
    pub fn entries(self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let index = self.index;
        self.table
            .columns
            .iter()
            .map(move |c| (c.name.as_str(), &c.values[index]))
    }

    pub fn values(self) -> Vec<Value> {
        self.entries().map(|(_, v)| v.clone()).collect()
    }
}

impl Table {
    /// Empty table with a known column list.
    pub fn empty<S: AsRef<str>>(names: &[S]) -> Self {
        let columns = names
            .iter()
            .map(|n| Column::new(n.as_ref(), Vec::new()))
            .collect();
        Self { columns, rows: 0 }
    }

    /// Build a table from columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = columns.first().map_or(0, |c| c.values.len());
        let mut seen: Vec<&str> = Vec::new();
        for col in &columns {
            if seen.contains(&col.name.as_str()) {
                return Err(TableError::DuplicateColumn(col.name.clone()));
            }
            seen.push(&col.name);
            if col.values.len() != rows {
                return Err(TableError::LengthMismatch {
                    column: col.name.clone(),
                    expected: rows,
                    found: col.values.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from a header and positional rows.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        let width = names.len();
        let mut data: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); width];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(TableError::WidthMismatch {
                    row: i,
                    expected: width,
                    found: row.len(),
                });
            }
            for (slot, value) in data.iter_mut().zip(row) {
                slot.push(value);
            }
        }
        let columns = names
            .iter()
            .zip(data)
            .map(|(n, values)| Column::new(n.as_ref(), values))
            .collect();
        Self::from_columns(columns)
    }

    /// Convert row mappings into a table.
    ///
    /// The first record fixes the column order; every later record must carry
    /// the same names in the same order. Zero records produce a table with no
    /// columns.
    pub fn from_records(records: Vec<Vec<(String, Value)>>) -> Result<Self, TableError> {
        let Some(first) = records.first() else {
            return Ok(Self::default());
        };
        let names: Vec<String> = first.iter().map(|(n, _)| n.clone()).collect();
        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let found: Vec<&str> = record.iter().map(|(n, _)| n.as_str()).collect();
            if found != names {
                return Err(TableError::ColumnMismatch {
                    row: i,
                    expected: names.clone(),
                    found: found.into_iter().map(String::from).collect(),
                });
            }
            rows.push(record.into_iter().map(|(_, v)| v).collect());
        }
        Self::from_rows(&names, rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Same as [`Table::column`] but reports a missing name as an error.
    pub fn require(&self, name: &str) -> Result<&Column, TableError> {
        self.column(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.rows).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows).map(move |index| Row { table: self, index })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = indices.iter().map(|&i| c.values[i].clone()).collect();
                Column {
                    name: c.name.clone(),
                    dtype: c.dtype,
                    values,
                }
            })
            .collect();
        Table {
            columns,
            rows: indices.len(),
        }
    }

    pub fn head(&self, n: usize) -> Table {
        let indices: Vec<usize> = (0..self.rows.min(n)).collect();
        self.take(&indices)
    }

    /// Stable sort by the given `(column, descending)` keys.
    pub fn sort_by(&self, keys: &[(&str, bool)]) -> Result<Table, TableError> {
        let cols = keys
            .iter()
            .map(|(name, desc)| self.require(name).map(|c| (c, *desc)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut indices: Vec<usize> = (0..self.rows).collect();
        indices.sort_by(|&a, &b| {
            cols.iter()
                .map(|(c, desc)| sort_order(&c.values[a], &c.values[b], *desc))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(self.take(&indices))
    }

    /// Keep only the named columns, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Table, TableError> {
        let columns = names
            .iter()
            .map(|n| self.require(n).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table {
            columns,
            rows: self.rows,
        })
    }

    /// Replace a column with the same name, or append a new one.
    pub fn with_column(mut self, column: Column) -> Result<Table, TableError> {
        if column.values.len() != self.rows && !self.columns.is_empty() {
            return Err(TableError::LengthMismatch {
                column: column.name,
                expected: self.rows,
                found: column.values.len(),
            });
        }
        if self.columns.is_empty() {
            self.rows = column.values.len();
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(slot) => *slot = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }
}

/// Compare two cells for a sort; nulls go last in both directions.
pub(crate) fn sort_order(a: &Value, b: &Value, descending: bool) -> Ordering {
    let ord = a.total_cmp(b);
    if descending && !a.is_null() && !b.is_null() {
        ord.reverse()
    } else {
        ord
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_from_records_keeps_order_and_types() {
        let table = Table::from_records(vec![
            record(&[("cuisine", "Thai".into()), ("recipe_count", Value::Int(3))]),
            record(&[("cuisine", "Padang".into()), ("recipe_count", Value::Float(1.5))]),
        ])
        .unwrap();

        assert_eq!(table.column_names(), vec!["cuisine", "recipe_count"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("cuisine").unwrap().dtype, ValueType::Text);
        assert_eq!(table.column("recipe_count").unwrap().dtype, ValueType::Float);
    }

    #[test]
    fn test_from_records_rejects_mismatched_columns() {
        let err = Table::from_records(vec![
            record(&[("a", Value::Int(1)), ("b", Value::Int(2))]),
            record(&[("b", Value::Int(2)), ("a", Value::Int(1))]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::ColumnMismatch { row: 1, .. }));
    }

    #[test]
    fn test_from_records_empty() {
        let table = Table::from_records(vec![]).unwrap();
        assert!(table.is_empty());
        assert!(table.column_names().is_empty());
    }

    #[test]
    fn test_sort_desc_keeps_nulls_last() {
        let table = Table::from_rows(
            &["item", "sold"],
            vec![
                vec!["a".into(), Value::Null],
                vec!["b".into(), Value::Int(5)],
                vec!["c".into(), Value::Int(9)],
            ],
        )
        .unwrap();
        let sorted = table.sort_by(&[("sold", true)]).unwrap();
        let items: Vec<_> = sorted.column("item").unwrap().values.clone();
        assert_eq!(items, vec!["c".into(), "b".into(), "a".into()]);
    }

    #[test]
    fn test_with_column_replaces_in_place() {
        let table = Table::from_rows(&["a", "b"], vec![vec![Value::Int(1), Value::Int(2)]]).unwrap();
        let table = table
            .with_column(Column::new("a", vec![Value::Int(10)]))
            .unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.value(0, "a"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_row_entries() {
        let table = Table::from_rows(&["x", "y"], vec![vec![Value::Int(1), "one".into()]]).unwrap();
        let row = table.row(0).unwrap();
        let entries: Vec<_> = row.entries().map(|(n, _)| n).collect();
        assert_eq!(entries, vec!["x", "y"]);
        assert_eq!(row.get("y"), Some(&Value::from("one")));
        assert!(table.row(1).is_none());
    }
}
