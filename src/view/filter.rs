use super::{require, ViewError};
use crate::table::Table;
use crate::value::Value;
use std::cmp::Ordering;

/// One condition a row must meet to stay in a filtered view.
///
/// A null cell never satisfies any predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Closed interval `[min, max]`; either bound may be infinite.
    Range { column: String, min: f64, max: f64 },
    Equals { column: String, value: Value },
    OneOf { column: String, values: Vec<Value> },
}

impl Predicate {
    pub fn range(column: &str, min: f64, max: f64) -> Self {
        Predicate::Range {
            column: column.to_string(),
            min,
            max,
        }
    }

    pub fn at_least(column: &str, min: f64) -> Self {
        Self::range(column, min, f64::INFINITY)
    }

    pub fn at_most(column: &str, max: f64) -> Self {
        Self::range(column, f64::NEG_INFINITY, max)
    }

    pub fn equals(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn one_of(column: &str, values: Vec<Value>) -> Self {
        Predicate::OneOf {
            column: column.to_string(),
            values,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Range { column, .. }
            | Predicate::Equals { column, .. }
            | Predicate::OneOf { column, .. } => column,
        }
    }

    pub fn matches(&self, cell: &Value) -> bool {
        if cell.is_null() {
            return false;
        }
        match self {
            Predicate::Range { min, max, .. } => cell
                .as_f64()
                .is_some_and(|x| *min <= x && x <= *max),
            Predicate::Equals { value, .. } => same(cell, value),
            Predicate::OneOf { values, .. } => values.iter().any(|v| same(cell, v)),
        }
    }
}

fn same(cell: &Value, wanted: &Value) -> bool {
    !wanted.is_null() && cell.total_cmp(wanted) == Ordering::Equal
}

/// Rows satisfying every predicate, in their original order.
///
/// Matching nothing yields an empty table with the same columns.
pub fn filter(table: &Table, predicates: &[Predicate]) -> Result<Table, ViewError> {
    let columns = predicates
        .iter()
        .map(|p| require(table, p.column()).map(|c| (p, c)))
        .collect::<Result<Vec<_>, _>>()?;
    let keep: Vec<usize> = (0..table.row_count())
        .filter(|&i| columns.iter().all(|(p, c)| p.matches(&c.values[i])))
        .collect();
    Ok(table.take(&keep))
}

/// The `n` largest rows by `by`, ties broken by `tie_break` ascending and
/// then by original position.
pub fn top_n(table: &Table, by: &str, n: usize, tie_break: Option<&str>) -> Result<Table, ViewError> {
    require(table, by)?;
    let mut keys = vec![(by, true)];
    if let Some(tb) = tie_break {
        require(table, tb)?;
        keys.push((tb, false));
    }
    Ok(table.sort_by(&keys)?.head(n))
}

/// Keep only the chosen columns, in the order chosen.
pub fn select_columns(table: &Table, names: &[&str]) -> Result<Table, ViewError> {
    for name in names {
        require(table, name)?;
    }
    Ok(table.select(names)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers() -> Table {
        Table::from_rows(
            &["name", "age", "city"],
            vec![
                vec!["Ayu".into(), Value::Int(24), "Padang".into()],
                vec!["Budi".into(), Value::Int(41), "Medan".into()],
                vec!["Citra".into(), Value::Null, "Padang".into()],
                vec!["Dewi".into(), Value::Int(33), "Bukittinggi".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_range_is_closed_and_skips_nulls() {
        let out = filter(&customers(), &[Predicate::range("age", 24.0, 33.0)]).unwrap();
        assert_eq!(
            out.column("name").unwrap().values,
            vec![Value::from("Ayu"), Value::from("Dewi")]
        );
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let out = filter(
            &customers(),
            &[
                Predicate::at_least("age", 30.0),
                Predicate::one_of("city", vec!["Padang".into(), "Bukittinggi".into()]),
            ],
        )
        .unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.value(0, "name"), Some(&Value::from("Dewi")));
    }

    #[test]
    fn test_filter_is_subset_and_idempotent() {
        let table = customers();
        let preds = [Predicate::equals("city", "Padang")];
        let once = filter(&table, &preds).unwrap();
        let twice = filter(&once, &preds).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.column_names(), table.column_names());
        for row in once.rows() {
            assert!(table.rows().any(|r| r.values() == row.values()));
        }
    }

    #[test]
    fn test_no_match_gives_empty_table() {
        let out = filter(&customers(), &[Predicate::at_least("age", 100.0)]).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.column_names(), vec!["name", "age", "city"]);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let err = filter(&customers(), &[Predicate::equals("country", "ID")]).unwrap_err();
        assert_eq!(err, ViewError::UnknownColumn("country".to_string()));
    }

    #[test]
    fn test_top_n_with_tie_break() {
        let table = Table::from_rows(
            &["item", "sold"],
            vec![
                vec!["b".into(), Value::Int(5)],
                vec!["a".into(), Value::Int(5)],
                vec!["c".into(), Value::Int(9)],
            ],
        )
        .unwrap();
        let out = top_n(&table, "sold", 2, Some("item")).unwrap();
        assert_eq!(
            out.column("item").unwrap().values,
            vec![Value::from("c"), Value::from("a")]
        );
    }

    #[test]
    fn test_select_columns_reorders() {
        let out = select_columns(&customers(), &["city", "name"]).unwrap();
        assert_eq!(out.column_names(), vec!["city", "name"]);
        assert!(select_columns(&customers(), &["nope"]).is_err());
    }
}
