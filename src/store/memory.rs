//! In-memory relations and a direct evaluator for aggregation specs.

use super::{Connection, Store, StoreError};
use crate::aggregate::{Aggregate, AggregationSpec, ColumnRef, QueryParams, ShareTotal, SortTarget, Source};
use crate::sql::{parse_sql, Dialect};
use crate::table::{sort_order, Column, Table};
use crate::value::{round2, Value, ValueKey};
use std::borrow::Cow;
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Named tables held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    offline: bool,
    open: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every table a fixture script creates and fills.
    pub fn from_sql(script: &str, dialect: Dialect) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for fixture in parse_sql(script, dialect)? {
            store.insert(&fixture.name, fixture.table);
        }
        debug!(tables = store.tables.len(), "loaded fixture");
        Ok(store)
    }

    /// A store that refuses every connection.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, name: &str, table: Table) {
        self.tables.insert(name.to_string(), table);
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Connections currently checked out.
    pub fn open_connections(&self) -> usize {
        self.open.get()
    }

    fn lookup(&self, name: &str) -> Result<&Table, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::MissingTable(name.to_string()))
    }
}

impl Store for MemoryStore {
    fn describe(&self) -> String {
        format!("memory ({} tables)", self.tables.len())
    }

    fn acquire(&self) -> Result<Box<dyn Connection + '_>, StoreError> {
        if self.offline {
            return Err(StoreError::Unreachable("in-memory store is offline".to_string()));
        }
        self.open.set(self.open.get() + 1);
        Ok(Box::new(MemoryConnection { store: self }))
    }
}

struct MemoryConnection<'a> {
    store: &'a MemoryStore,
}

impl Drop for MemoryConnection<'_> {
    fn drop(&mut self) {
        self.store.open.set(self.store.open.get().saturating_sub(1));
    }
}

impl Connection for MemoryConnection<'_> {
    fn run(&mut self, spec: &AggregationSpec, params: &QueryParams) -> Result<Table, StoreError> {
        spec.validate()?;
        let table = evaluate(self.store, spec, params)?;
        debug!(spec = %spec.name, rows = table.row_count(), "evaluated in memory");
        Ok(table)
    }
}

/// A table bound to the alias the spec addresses it by.
struct Relation<'a> {
    alias: String,
    name: String,
    table: Cow<'a, Table>,
}

/// One joined source row: a row index into each relation, in relation order.
type Combo = Vec<usize>;

struct OutputRow {
    visible: Vec<Value>,
    /// Every key value, group-only keys included, in key order.
    keys: Vec<Value>,
}

fn evaluate(store: &MemoryStore, spec: &AggregationSpec, params: &QueryParams) -> Result<Table, StoreError> {
    let (relations, combos) = bind_source(store, spec, params)?;

    let key_cols = spec
        .keys
        .iter()
        .map(|k| resolve(&relations, &k.column))
        .collect::<Result<Vec<_>, _>>()?;
    let key_values = |combo: &Combo| -> Vec<Value> {
        key_cols
            .iter()
            .map(|(pos, col)| col.values[combo[*pos]].clone())
            .collect()
    };
    let visible_mask: Vec<bool> = spec.keys.iter().map(|k| k.alias.is_some()).collect();
    let visible_keys = |keys: &[Value]| -> Vec<Value> {
        keys.iter()
            .zip(&visible_mask)
            .filter(|(_, visible)| **visible)
            .map(|(v, _)| v.clone())
            .collect()
    };

    let mut rows: Vec<OutputRow> = Vec::new();
    if spec.is_grouped() {
        let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
        let mut lookup: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        for (i, combo) in combos.iter().enumerate() {
            let values = key_values(combo);
            let identity: Vec<ValueKey> = values.iter().map(Value::key).collect();
            match lookup.get(&identity) {
                Some(&g) => groups[g].1.push(i),
                None => {
                    lookup.insert(identity, groups.len());
                    groups.push((values, vec![i]));
                }
            }
        }
        // An ungrouped aggregate still yields its single row over no input.
        if spec.keys.is_empty() && groups.is_empty() {
            groups.push((Vec::new(), Vec::new()));
        }

        let mut measures: Vec<Vec<Value>> = Vec::with_capacity(spec.measures.len());
        for m in &spec.measures {
            let column = match &m.aggregate {
                Aggregate::Share { of, total } => {
                    let base = spec
                        .measures
                        .iter()
                        .position(|p| &p.alias == of)
                        .and_then(|i| measures.get(i))
                        .ok_or_else(|| StoreError::MissingColumn {
                            table: spec.name.clone(),
                            column: of.clone(),
                        })?;
                    let total = match total {
                        ShareTotal::AllGroups => base.iter().filter_map(Value::as_f64).sum::<f64>(),
                        ShareTotal::RowsOf(table) => store.lookup(table)?.row_count() as f64,
                    };
                    base.iter().map(|v| share(v, total)).collect()
                }
                agg => groups
                    .iter()
                    .map(|(_, members)| aggregate(agg, &relations, &combos, members))
                    .collect::<Result<Vec<_>, _>>()?,
            };
            measures.push(column);
        }

        for (g, (keys, _)) in groups.into_iter().enumerate() {
            let mut visible = visible_keys(&keys);
            visible.extend(measures.iter().map(|column| column[g].clone()));
            rows.push(OutputRow { visible, keys });
        }
    } else {
        for combo in &combos {
            let keys = key_values(combo);
            rows.push(OutputRow {
                visible: visible_keys(&keys),
                keys,
            });
        }
    }

    let names = spec.output_columns();
    order_rows(spec, &names, &mut rows);
    if let Some(limit) = spec.resolve_limit(params) {
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    if rows.is_empty() {
        return Ok(Table::empty(&names));
    }
    Ok(Table::from_rows(
        &names,
        rows.into_iter().map(|r| r.visible).collect(),
    )?)
}

fn bind_source<'a>(
    store: &'a MemoryStore,
    spec: &AggregationSpec,
    params: &QueryParams,
) -> Result<(Vec<Relation<'a>>, Vec<Combo>), StoreError> {
    match &spec.source {
        Source::Stage { alias, spec: stage } => {
            let table = evaluate(store, stage, params)?;
            let combos = (0..table.row_count()).map(|i| vec![i]).collect();
            let relation = Relation {
                alias: alias.clone(),
                name: stage.name.clone(),
                table: Cow::Owned(table),
            };
            Ok((vec![relation], combos))
        }
        Source::Tables { from, joins } => {
            let base = store.lookup(&from.name)?;
            let mut relations = vec![Relation {
                alias: from.alias.clone(),
                name: from.name.clone(),
                table: Cow::Borrowed(base),
            }];
            let mut combos: Vec<Combo> = (0..base.row_count()).map(|i| vec![i]).collect();

            for join in joins {
                let joined = store.lookup(&join.table.name)?;
                let (bound, probe) = if join.right.table == join.table.alias {
                    (&join.left, &join.right)
                } else {
                    (&join.right, &join.left)
                };
                let probe_col = joined
                    .column(&probe.column)
                    .ok_or_else(|| StoreError::MissingColumn {
                        table: join.table.name.clone(),
                        column: probe.column.clone(),
                    })?;

                let mut index: HashMap<ValueKey, Vec<usize>> = HashMap::new();
                for (i, v) in probe_col.values.iter().enumerate() {
                    // NULL never equals anything, itself included.
                    if !v.is_null() {
                        index.entry(join_key(v)).or_default().push(i);
                    }
                }

                let (pos, bound_col) = resolve(&relations, bound)?;
                let next: Vec<Combo> = combos
                    .iter()
                    .flat_map(|combo| {
                        let v = &bound_col.values[combo[pos]];
                        let matches = if v.is_null() {
                            &[][..]
                        } else {
                            index.get(&join_key(v)).map_or(&[][..], Vec::as_slice)
                        };
                        matches.iter().map(move |&r| {
                            let mut extended = combo.clone();
                            extended.push(r);
                            extended
                        })
                    })
                    .collect();
                combos = next;
                relations.push(Relation {
                    alias: join.table.alias.clone(),
                    name: join.table.name.clone(),
                    table: Cow::Borrowed(joined),
                });
            }
            Ok((relations, combos))
        }
    }
}

/// Join identity; whole floats match integers the way SQL compares them.
fn join_key(v: &Value) -> ValueKey {
    match v {
        Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => ValueKey::Int(*f as i64),
        other => other.key(),
    }
}

fn resolve<'r>(relations: &'r [Relation<'_>], c: &ColumnRef) -> Result<(usize, &'r Column), StoreError> {
    let pos = relations
        .iter()
        .position(|r| r.alias == c.table)
        .ok_or_else(|| StoreError::MissingTable(c.table.clone()))?;
    let relation = &relations[pos];
    let column = relation
        .table
        .column(&c.column)
        .ok_or_else(|| StoreError::MissingColumn {
            table: relation.name.clone(),
            column: c.column.clone(),
        })?;
    Ok((pos, column))
}

/// Non-null cells of `c` for the given group members.
fn cells<'r>(
    relations: &'r [Relation<'_>],
    combos: &[Combo],
    members: &[usize],
    c: &ColumnRef,
) -> Result<Vec<&'r Value>, StoreError> {
    let (pos, col) = resolve(relations, c)?;
    Ok(members
        .iter()
        .map(|&i| &col.values[combos[i][pos]])
        .filter(|v| !v.is_null())
        .collect())
}

fn numbers(cells: &[&Value], c: &ColumnRef) -> Result<Vec<f64>, StoreError> {
    cells
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| StoreError::NotNumeric(format!("{}.{}", c.table, c.column)))
        })
        .collect()
}

fn aggregate(
    agg: &Aggregate,
    relations: &[Relation<'_>],
    combos: &[Combo],
    members: &[usize],
) -> Result<Value, StoreError> {
    let cells_of = |c: &ColumnRef| cells(relations, combos, members, c);
    Ok(match agg {
        Aggregate::Count => Value::Int(members.len() as i64),
        Aggregate::CountOf(c) => Value::Int(cells_of(c)?.len() as i64),
        Aggregate::CountDistinct(c) => {
            let distinct: HashSet<ValueKey> = cells_of(c)?.into_iter().map(Value::key).collect();
            Value::Int(distinct.len() as i64)
        }
        Aggregate::Sum(c) => sum(&cells_of(c)?, c)?,
        Aggregate::Avg(c) => {
            let values = numbers(&cells_of(c)?, c)?;
            if values.is_empty() {
                Value::Null
            } else {
                Value::Float(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Aggregate::Min(c) => cells_of(c)?
            .into_iter()
            .min_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        Aggregate::Max(c) => cells_of(c)?
            .into_iter()
            .max_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        Aggregate::Ratio {
            numerator,
            denominator,
        } => {
            let num = numbers(&cells_of(numerator)?, numerator)?;
            let den = numbers(&cells_of(denominator)?, denominator)?;
            let den_total: f64 = den.iter().sum();
            if num.is_empty() || den.is_empty() || den_total == 0.0 {
                Value::Null
            } else {
                Value::Float(num.iter().sum::<f64>() / den_total)
            }
        }
        // Shares need every group's value; the caller fills them in.
        Aggregate::Share { .. } => Value::Null,
    })
}

/// SQL SUM: integer while every input is an integer, null over no input.
fn sum(cells: &[&Value], c: &ColumnRef) -> Result<Value, StoreError> {
    if cells.is_empty() {
        return Ok(Value::Null);
    }
    let ints: Option<Vec<i64>> = cells
        .iter()
        .map(|v| match v {
            Value::Int(n) => Some(*n),
            _ => None,
        })
        .collect();
    if let Some(total) = ints.and_then(|ns| ns.into_iter().try_fold(0i64, i64::checked_add)) {
        return Ok(Value::Int(total));
    }
    Ok(Value::Float(numbers(cells, c)?.iter().sum()))
}

fn share(value: &Value, total: f64) -> Value {
    match value.as_f64() {
        Some(v) if total != 0.0 => Value::Float(round2(v / total * 100.0)),
        _ => Value::Null,
    }
}

fn order_rows(spec: &AggregationSpec, names: &[&str], rows: &mut [OutputRow]) {
    enum Slot {
        Visible(usize),
        Key(usize),
    }
    let slots: Vec<(Slot, bool)> = spec
        .ordering()
        .into_iter()
        .filter_map(|key| {
            let slot = match &key.target {
                SortTarget::Output(alias) => names.iter().position(|n| *n == alias.as_str()).map(Slot::Visible),
                SortTarget::Hidden(c) => spec
                    .keys
                    .iter()
                    .position(|k| k.alias.is_none() && &k.column == c)
                    .map(Slot::Key),
            };
            slot.map(|s| (s, key.descending))
        })
        .collect();

    rows.sort_by(|a, b| {
        slots
            .iter()
            .map(|(slot, desc)| match slot {
                Slot::Visible(i) => sort_order(&a.visible[*i], &b.visible[*i], *desc),
                Slot::Key(i) => sort_order(&a.keys[*i], &b.keys[*i], *desc),
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{col, Limit};

    const FIXTURE: &str = "
        CREATE TABLE type_cuisine_table (type_cuisine_id INT, type_cuisine_name TEXT);
        CREATE TABLE recipe_table (recipe_id INT, recipe_name TEXT, type_cuisine_id INT);
        INSERT INTO type_cuisine_table VALUES (1, 'A'), (2, 'B'), (3, 'C');
        INSERT INTO recipe_table VALUES
            (1, 'r1', 1), (2, 'r2', 1), (3, 'r3', 1), (4, 'r4', 2), (5, 'r5', NULL), (6, 'r1', 2);
    ";

    fn store() -> MemoryStore {
        MemoryStore::from_sql(FIXTURE, Dialect::Generic).unwrap()
    }

    fn by_cuisine() -> AggregationSpec {
        AggregationSpec::from_table("by_cuisine", "recipe_table", "r")
            .join(
                "type_cuisine_table",
                "t",
                col("r", "type_cuisine_id"),
                col("t", "type_cuisine_id"),
            )
            .key(col("t", "type_cuisine_name"), "cuisine")
            .measure(Aggregate::Count, "recipe_count")
            .rank_by("recipe_count")
    }

    fn run(store: &MemoryStore, spec: &AggregationSpec) -> Table {
        let mut conn = store.acquire().unwrap();
        conn.run(spec, &QueryParams::default()).unwrap()
    }

    #[test]
    fn test_inner_join_drops_null_keys() {
        let table = run(&store(), &by_cuisine());
        assert_eq!(
            table.column("cuisine").unwrap().values,
            vec![Value::from("A"), Value::from("B")]
        );
        assert_eq!(
            table.column("recipe_count").unwrap().values,
            vec![Value::Int(3), Value::Int(2)]
        );
    }

    #[test]
    fn test_group_only_key_keeps_same_names_apart() {
        let spec = AggregationSpec::from_table("per_recipe", "recipe_table", "r")
            .group_only(col("r", "recipe_id"))
            .key(col("r", "recipe_name"), "recipe_name")
            .measure(Aggregate::Count, "n")
            .rank_by("n");
        let table = run(&store(), &spec);
        assert_eq!(table.row_count(), 6);
        assert_eq!(table.column_names(), vec!["recipe_name", "n"]);
        // Ties on n and name fall back to recipe_id: r1 (id 1) then r1 (id 6).
        assert_eq!(table.value(0, "recipe_name"), Some(&Value::from("r1")));
        assert_eq!(table.value(1, "recipe_name"), Some(&Value::from("r1")));
    }

    #[test]
    fn test_share_over_all_groups() {
        let spec = by_cuisine().measure(
            Aggregate::Share {
                of: "recipe_count".into(),
                total: ShareTotal::AllGroups,
            },
            "pct",
        );
        let table = run(&store(), &spec);
        assert_eq!(
            table.column("pct").unwrap().values,
            vec![Value::Float(60.0), Value::Float(40.0)]
        );
    }

    #[test]
    fn test_share_of_table_rows() {
        let spec = by_cuisine().measure(
            Aggregate::Share {
                of: "recipe_count".into(),
                total: ShareTotal::RowsOf("recipe_table".into()),
            },
            "coverage",
        );
        let table = run(&store(), &spec);
        assert_eq!(table.value(0, "coverage"), Some(&Value::Float(50.0)));
        assert_eq!(table.value(1, "coverage"), Some(&Value::Float(33.33)));
    }

    #[test]
    fn test_two_stage_statistics() {
        let inner = AggregationSpec::from_table("per_cuisine", "recipe_table", "r")
            .key(col("r", "type_cuisine_id"), "cuisine_id")
            .measure(Aggregate::Count, "n");
        let spec = AggregationSpec::from_stage("stats", "s", inner)
            .measure(Aggregate::Avg(col("s", "n")), "avg_n")
            .measure(Aggregate::Max(col("s", "n")), "max_n")
            .measure(Aggregate::Count, "groups");
        let table = run(&store(), &spec);
        assert_eq!(table.row_count(), 1);
        // Groups: 1 -> 3, 2 -> 2, NULL -> 1.
        assert_eq!(table.value(0, "avg_n"), Some(&Value::Float(2.0)));
        assert_eq!(table.value(0, "max_n"), Some(&Value::Int(3)));
        assert_eq!(table.value(0, "groups"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_limit_and_empty_result() {
        let limited = by_cuisine().limit(Limit::Param { default: 10 });
        let store = store();
        let mut conn = store.acquire().unwrap();
        let table = conn.run(&limited, &QueryParams::with_limit(1)).unwrap();
        assert_eq!(table.row_count(), 1);

        let table = conn.run(&limited, &QueryParams::with_limit(0)).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["cuisine", "recipe_count"]);
    }

    #[test]
    fn test_missing_table_and_column() {
        let store = store();
        let mut conn = store.acquire().unwrap();
        let spec = AggregationSpec::from_table("ghost", "nope", "n").key(col("n", "x"), "x");
        assert!(matches!(
            conn.run(&spec, &QueryParams::default()),
            Err(StoreError::MissingTable(t)) if t == "nope"
        ));

        let spec = AggregationSpec::from_table("ghost", "recipe_table", "r").key(col("r", "zzz"), "x");
        assert!(matches!(
            conn.run(&spec, &QueryParams::default()),
            Err(StoreError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_connections_release_on_drop() {
        let store = store();
        {
            let _a = store.acquire().unwrap();
            let _b = store.acquire().unwrap();
            assert_eq!(store.open_connections(), 2);
        }
        assert_eq!(store.open_connections(), 0);
    }

    #[test]
    fn test_offline_store_refuses_connections() {
        assert!(matches!(
            MemoryStore::offline().acquire(),
            Err(StoreError::Unreachable(_))
        ));
    }

    #[test]
    fn test_aggregate_without_keys_over_no_rows() {
        let mut store = MemoryStore::new();
        store.insert("t", Table::empty(&["x"]));
        let spec = AggregationSpec::from_table("totals", "t", "t")
            .measure(Aggregate::Count, "n")
            .measure(Aggregate::Sum(col("t", "x")), "total");
        let table = run(&store, &spec);
        assert_eq!(table.value(0, "n"), Some(&Value::Int(0)));
        assert_eq!(table.value(0, "total"), Some(&Value::Null));
    }
}
