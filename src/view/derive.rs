use super::{require, ViewError};
use crate::table::{Column, Table};
use crate::value::{round2, Value, ValueKey, ValueType};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

/// How to compute one derived column.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedRule {
    /// Whole years between `birthdate` and `today`, counting 365-day years.
    Age {
        birthdate: String,
        target: String,
        today: NaiveDate,
    },
    /// `left * right`, e.g. revenue from price and quantity.
    Product {
        left: String,
        right: String,
        target: String,
    },
    /// Each value as a percentage of the column total, two decimals.
    PercentageShare { value: String, target: String },
}

impl DerivedRule {
    pub fn target(&self) -> &str {
        match self {
            DerivedRule::Age { target, .. }
            | DerivedRule::Product { target, .. }
            | DerivedRule::PercentageShare { target, .. } => target,
        }
    }
}

/// Add (or replace in place) the column a rule computes.
pub fn compute_derived(table: &Table, rule: &DerivedRule) -> Result<Table, ViewError> {
    let values = match rule {
        DerivedRule::Age {
            birthdate, today, ..
        } => {
            let col = require(table, birthdate)?;
            col.values
                .iter()
                .map(|v| age(v, *today).ok_or_else(|| not_date(birthdate, v)))
                .collect::<Result<Vec<_>, _>>()?
        }
        DerivedRule::Product { left, right, .. } => {
            let l = require(table, left)?;
            let r = require(table, right)?;
            l.values
                .iter()
                .zip(&r.values)
                .map(|(a, b)| product(a, b, left, right))
                .collect::<Result<Vec<_>, _>>()?
        }
        DerivedRule::PercentageShare { value, .. } => {
            let col = require(table, value)?;
            let mut total = 0.0;
            for v in col.values.iter().filter(|v| !v.is_null()) {
                total += v.as_f64().ok_or_else(|| ViewError::not_numeric(value, v))?;
            }
            col.values
                .iter()
                .map(|v| match v.as_f64() {
                    // A zero total has no meaningful share; every row gets null.
                    Some(x) if total != 0.0 => Value::Float(round2(x / total * 100.0)),
                    _ => Value::Null,
                })
                .collect()
        }
    };
    Ok(table
        .clone()
        .with_column(Column::new(rule.target(), values))?)
}

fn not_date(column: &str, value: &Value) -> ViewError {
    ViewError::NotDate {
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// `None` when the cell is neither null nor readable as a date.
fn age(cell: &Value, today: NaiveDate) -> Option<Value> {
    let born = match cell {
        Value::Null => return Some(Value::Null),
        Value::Text(s) => match Value::parse_as(s, ValueType::Date)? {
            Value::Date(d) => d,
            _ => return None,
        },
        other => other.as_date()?,
    };
    let days = (today - born).num_days();
    Some(Value::Int(days.div_euclid(365)))
}

fn product(a: &Value, b: &Value, left: &str, right: &str) -> Result<Value, ViewError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if let Some(p) = x.checked_mul(*y) {
            return Ok(Value::Int(p));
        }
    }
    let x = a.as_f64().ok_or_else(|| ViewError::not_numeric(left, a))?;
    let y = b.as_f64().ok_or_else(|| ViewError::not_numeric(right, b))?;
    Ok(Value::Float(x * y))
}

/// Per-group statistics in two stages.
///
/// Stage one counts rows per `(group, entity)`; stage two reduces those counts
/// per group to `avg_<prefix>`, `min_<prefix>`, `max_<prefix>` and `count` (the
/// number of entities). Rows are ordered by the average descending, then by
/// group ascending.
pub fn two_stage_stats(table: &Table, group: &str, entity: &str, prefix: &str) -> Result<Table, ViewError> {
    let groups = require(table, group)?;
    let entities = require(table, entity)?;

    // Stage one.
    let mut per_entity: Vec<(Value, i64)> = Vec::new();
    let mut seen: HashMap<(ValueKey, ValueKey), usize> = HashMap::new();
    for (g, e) in groups.values.iter().zip(&entities.values) {
        let id = (g.key(), e.key());
        match seen.get(&id) {
            Some(&i) => per_entity[i].1 += 1,
            None => {
                seen.insert(id, per_entity.len());
                per_entity.push((g.clone(), 1));
            }
        }
    }

    // Stage two, keyed by the same group value.
    let mut order: Vec<Value> = Vec::new();
    let mut counts: HashMap<ValueKey, Vec<i64>> = HashMap::new();
    for (g, n) in per_entity {
        counts
            .entry(g.key())
            .or_insert_with(|| {
                order.push(g.clone());
                Vec::new()
            })
            .push(n);
    }

    let rows = order
        .into_iter()
        .map(|g| {
            let ns = &counts[&g.key()];
            let sum: i64 = ns.iter().sum();
            vec![
                g,
                Value::Float(sum as f64 / ns.len() as f64),
                Value::Int(ns.iter().copied().min().unwrap_or(0)),
                Value::Int(ns.iter().copied().max().unwrap_or(0)),
                Value::Int(ns.len() as i64),
            ]
        })
        .collect();
    let avg = format!("avg_{}", prefix);
    let names = [
        group.to_string(),
        avg.clone(),
        format!("min_{}", prefix),
        format!("max_{}", prefix),
        "count".to_string(),
    ];
    let stats = Table::from_rows(&names, rows)?;
    Ok(stats.sort_by(&[(avg.as_str(), true), (group, false)])?)
}

/// Sum of `value` per distinct `key`, largest first, ties by key.
pub fn group_sum(table: &Table, key: &str, value: &str) -> Result<Table, ViewError> {
    let keys = require(table, key)?;
    let values = require(table, value)?;

    let mut order: Vec<Value> = Vec::new();
    let mut sums: HashMap<ValueKey, Vec<&Value>> = HashMap::new();
    for (k, v) in keys.values.iter().zip(&values.values) {
        if !v.is_null() && v.as_f64().is_none() {
            return Err(ViewError::not_numeric(value, v));
        }
        sums.entry(k.key())
            .or_insert_with(|| {
                order.push(k.clone());
                Vec::new()
            })
            .push(v);
    }

    let rows = order
        .into_iter()
        .map(|k| {
            let total = sum_cells(&sums[&k.key()]);
            vec![k, total]
        })
        .collect();
    let out = Table::from_rows(&[key, value], rows)?;
    Ok(out.sort_by(&[(value, true), (key, false)])?)
}

/// Sum of `value` per calendar month of `date`, oldest month first.
///
/// The month is keyed by its last day, e.g. `2024-01-31`.
pub fn monthly_sum(table: &Table, date: &str, value: &str) -> Result<Table, ViewError> {
    let dates = require(table, date)?;
    let values = require(table, value)?;

    let mut months: Vec<(NaiveDate, Vec<&Value>)> = Vec::new();
    for (d, v) in dates.values.iter().zip(&values.values) {
        if d.is_null() {
            continue;
        }
        let day = match d {
            Value::Text(s) => match Value::parse_as(s, ValueType::Date) {
                Some(Value::Date(day)) => day,
                _ => return Err(not_date(date, d)),
            },
            other => other.as_date().ok_or_else(|| not_date(date, d))?,
        };
        if !v.is_null() && v.as_f64().is_none() {
            return Err(ViewError::not_numeric(value, v));
        }
        let end = month_end(day);
        match months.iter_mut().find(|(m, _)| *m == end) {
            Some((_, cells)) => cells.push(v),
            None => months.push((end, vec![v])),
        }
    }
    months.sort_by_key(|(m, _)| *m);

    let rows = months
        .into_iter()
        .map(|(m, cells)| vec![Value::Date(m), sum_cells(&cells)])
        .collect();
    let out = Table::from_rows(&[date, value], rows)?;
    if out.is_empty() {
        return Ok(Table::empty(&[date, value]));
    }
    Ok(out)
}

fn month_end(day: NaiveDate) -> NaiveDate {
    let (y, m) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(day)
}

/// Integer sum while every cell is an integer; nulls are skipped.
fn sum_cells(cells: &[&Value]) -> Value {
    let present: Vec<&Value> = cells.iter().copied().filter(|v| !v.is_null()).collect();
    if present.iter().all(|v| matches!(v, Value::Int(_))) {
        let total = present
            .iter()
            .filter_map(|v| match v {
                Value::Int(n) => Some(*n),
                _ => None,
            })
            .try_fold(0i64, i64::checked_add);
        if let Some(total) = total {
            return Value::Int(total);
        }
    }
    Value::Float(present.iter().filter_map(|v| v.as_f64()).sum())
}

/// The current local date.
#[cfg(target_arch = "wasm32")]
pub fn today() -> NaiveDate {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
        .unwrap_or_default()
}

/// The current local date.
#[cfg(not(target_arch = "wasm32"))]
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_floors_whole_years() {
        let table = Table::from_rows(
            &["name", "birthdate"],
            vec![
                vec!["a".into(), Value::Date(date(2000, 6, 15))],
                vec!["b".into(), Value::Null],
                vec!["c".into(), "1990-01-01".into()],
            ],
        )
        .unwrap();
        let rule = DerivedRule::Age {
            birthdate: "birthdate".into(),
            target: "Age".into(),
            today: date(2024, 6, 14),
        };
        let out = compute_derived(&table, &rule).unwrap();
        assert_eq!(
            out.column("Age").unwrap().values,
            vec![Value::Int(24), Value::Null, Value::Int(34)]
        );
        assert_eq!(out.column_names(), vec!["name", "birthdate", "Age"]);
    }

    #[test]
    fn test_product_keeps_integers() {
        let table = Table::from_rows(
            &["price", "sold"],
            vec![
                vec![Value::Int(25000), Value::Int(3)],
                vec![Value::Float(1.5), Value::Int(2)],
                vec![Value::Null, Value::Int(2)],
            ],
        )
        .unwrap();
        let rule = DerivedRule::Product {
            left: "price".into(),
            right: "sold".into(),
            target: "revenue".into(),
        };
        let out = compute_derived(&table, &rule).unwrap();
        assert_eq!(
            out.column("revenue").unwrap().values,
            vec![Value::Int(75000), Value::Float(3.0), Value::Null]
        );
    }

    #[test]
    fn test_shares_sum_to_hundred() {
        let table = Table::from_rows(
            &["v"],
            vec![vec![Value::Int(1)], vec![Value::Int(1)], vec![Value::Int(1)]],
        )
        .unwrap();
        let rule = DerivedRule::PercentageShare {
            value: "v".into(),
            target: "share".into(),
        };
        let out = compute_derived(&table, &rule).unwrap();
        let total: f64 = out.column("share").unwrap().numbers().sum();
        assert!((total - 100.0).abs() <= 0.01 + 1e-9);
    }

    #[test]
    fn test_zero_total_share_is_null() {
        let table = Table::from_rows(&["v"], vec![vec![Value::Int(0)], vec![Value::Int(0)]]).unwrap();
        let rule = DerivedRule::PercentageShare {
            value: "v".into(),
            target: "v".into(),
        };
        let out = compute_derived(&table, &rule).unwrap();
        assert_eq!(out.column_names(), vec!["v"]);
        assert_eq!(out.column("v").unwrap().values, vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_two_stage_stats() {
        let table = Table::from_rows(
            &["cuisine", "recipe_id"],
            vec![
                vec!["A".into(), Value::Int(1)],
                vec!["A".into(), Value::Int(1)],
                vec!["A".into(), Value::Int(2)],
                vec!["B".into(), Value::Int(3)],
                vec!["B".into(), Value::Int(3)],
            ],
        )
        .unwrap();
        let out = two_stage_stats(&table, "cuisine", "recipe_id", "ingredient_per_recipe").unwrap();
        assert_eq!(
            out.column_names(),
            vec![
                "cuisine",
                "avg_ingredient_per_recipe",
                "min_ingredient_per_recipe",
                "max_ingredient_per_recipe",
                "count"
            ]
        );
        // B averages 2.0 over one recipe, A 1.5 over two.
        assert_eq!(out.value(0, "cuisine"), Some(&Value::from("B")));
        assert_eq!(out.value(1, "avg_ingredient_per_recipe"), Some(&Value::Float(1.5)));
        assert_eq!(out.value(1, "min_ingredient_per_recipe"), Some(&Value::Int(1)));
        assert_eq!(out.value(1, "count"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_group_sum_orders_by_total() {
        let table = Table::from_rows(
            &["product", "qty"],
            vec![
                vec!["x".into(), Value::Int(2)],
                vec!["y".into(), Value::Int(5)],
                vec!["x".into(), Value::Int(4)],
            ],
        )
        .unwrap();
        let out = group_sum(&table, "product", "qty").unwrap();
        assert_eq!(out.column("product").unwrap().values, vec![Value::from("x"), Value::from("y")]);
        assert_eq!(out.column("qty").unwrap().values, vec![Value::Int(6), Value::Int(5)]);
    }

    #[test]
    fn test_monthly_sum_keys_by_month_end() {
        let table = Table::from_rows(
            &["order_date", "total_amount"],
            vec![
                vec![Value::Date(date(2024, 2, 10)), Value::Float(10.0)],
                vec![Value::Date(date(2024, 1, 5)), Value::Float(2.5)],
                vec![Value::Date(date(2024, 2, 29)), Value::Float(1.0)],
                vec![Value::Date(date(2023, 12, 31)), Value::Null],
            ],
        )
        .unwrap();
        let out = monthly_sum(&table, "order_date", "total_amount").unwrap();
        assert_eq!(
            out.column("order_date").unwrap().values,
            vec![
                Value::Date(date(2023, 12, 31)),
                Value::Date(date(2024, 1, 31)),
                Value::Date(date(2024, 2, 29)),
            ]
        );
        assert_eq!(
            out.column("total_amount").unwrap().values,
            vec![Value::Int(0), Value::Float(2.5), Value::Float(11.0)]
        );
    }
}
