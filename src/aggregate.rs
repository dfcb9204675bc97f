//! Declarative aggregation queries.
//!
//! An [`AggregationSpec`] names its source tables, grouping keys, measures,
//! ordering and limit. The same spec is evaluated in memory by
//! [`crate::store::MemoryStore`] and compiled to SQL by [`crate::sql::compile`].

use std::collections::HashSet;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SpecError {
    #[error("{spec}: duplicate output column {alias}")]
    DuplicateAlias { spec: String, alias: String },
    #[error("{spec}: unknown output column {alias}")]
    UnknownAlias { spec: String, alias: String },
    #[error("{spec}: unknown table alias {alias}")]
    UnknownTableAlias { spec: String, alias: String },
    #[error("{spec}: share of {of} must refer to an earlier plain measure")]
    InvalidShare { spec: String, of: String },
    #[error("{spec}: group-only key {column} needs at least one measure")]
    HiddenKeyWithoutGrouping { spec: String, column: String },
    #[error("{spec}: key {key} is not grouped by stage {stage}")]
    StageKeyMismatch {
        spec: String,
        stage: String,
        key: String,
    },
    #[error("{spec}: stage column {column} is not produced by stage {stage}")]
    UnknownStageColumn {
        spec: String,
        stage: String,
        column: String,
    },
}

/// `alias.column` reference inside a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

/// Shorthand for [`ColumnRef::new`].
pub fn col(table: &str, column: &str) -> ColumnRef {
    ColumnRef::new(table, column)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: String,
}

/// Inner equi-join `table ON left = right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Tables { from: TableRef, joins: Vec<Join> },
    /// Rows produced by another spec, addressed through `alias`.
    Stage {
        alias: String,
        spec: Box<AggregationSpec>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub column: ColumnRef,
    /// `None` groups by the column without returning it.
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShareTotal {
    /// Sum of the measure over every group of this query.
    AllGroups,
    /// Number of rows in a base table.
    RowsOf(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Count,
    CountOf(ColumnRef),
    CountDistinct(ColumnRef),
    Sum(ColumnRef),
    Avg(ColumnRef),
    Min(ColumnRef),
    Max(ColumnRef),
    /// `SUM(numerator) / SUM(denominator)`, null when the denominator sums to zero.
    Ratio {
        numerator: ColumnRef,
        denominator: ColumnRef,
    },
    /// `100 * measure / total`, two decimals, null when the total is zero.
    Share { of: String, total: ShareTotal },
}

impl Aggregate {
    pub fn columns(&self) -> Vec<&ColumnRef> {
        match self {
            Aggregate::Count | Aggregate::Share { .. } => vec![],
            Aggregate::CountOf(c)
            | Aggregate::CountDistinct(c)
            | Aggregate::Sum(c)
            | Aggregate::Avg(c)
            | Aggregate::Min(c)
            | Aggregate::Max(c) => vec![c],
            Aggregate::Ratio {
                numerator,
                denominator,
            } => vec![numerator, denominator],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub aggregate: Aggregate,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    None,
    Fixed(u64),
    /// Row limit taken from [`QueryParams::limit`], falling back to `default`.
    Param { default: u64 },
}

/// Parameters a caller may pass with a named query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueryParams {
    pub limit: Option<u64>,
}

impl QueryParams {
    pub fn with_limit(limit: u64) -> Self {
        Self { limit: Some(limit) }
    }
}

/// One ORDER BY entry after tie-break expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum SortTarget {
    Output(String),
    Hidden(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub target: SortTarget,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub name: String,
    pub source: Source,
    pub keys: Vec<Key>,
    pub measures: Vec<Measure>,
    /// Measure ranked descending before any tie-break.
    pub rank_by: Option<String>,
    /// Output columns compared ascending first when breaking ties.
    pub tie_break: Vec<String>,
    pub limit: Limit,
}

impl AggregationSpec {
    pub fn from_table(name: &str, table: &str, alias: &str) -> Self {
        Self::with_source(
            name,
            Source::Tables {
                from: TableRef {
                    name: table.to_string(),
                    alias: alias.to_string(),
                },
                joins: vec![],
            },
        )
    }

    pub fn from_stage(name: &str, alias: &str, stage: AggregationSpec) -> Self {
        Self::with_source(
            name,
            Source::Stage {
                alias: alias.to_string(),
                spec: Box::new(stage),
            },
        )
    }

    fn with_source(name: &str, source: Source) -> Self {
        Self {
            name: name.to_string(),
            source,
            keys: vec![],
            measures: vec![],
            rank_by: None,
            tie_break: vec![],
            limit: Limit::None,
        }
    }

    pub fn join(mut self, table: &str, alias: &str, left: ColumnRef, right: ColumnRef) -> Self {
        if let Source::Tables { joins, .. } = &mut self.source {
            joins.push(Join {
                table: TableRef {
                    name: table.to_string(),
                    alias: alias.to_string(),
                },
                left,
                right,
            });
        }
        self
    }

    pub fn key(mut self, column: ColumnRef, alias: &str) -> Self {
        self.keys.push(Key {
            column,
            alias: Some(alias.to_string()),
        });
        self
    }

    pub fn group_only(mut self, column: ColumnRef) -> Self {
        self.keys.push(Key {
            column,
            alias: None,
        });
        self
    }

    pub fn measure(mut self, aggregate: Aggregate, alias: &str) -> Self {
        self.measures.push(Measure {
            aggregate,
            alias: alias.to_string(),
        });
        self
    }

    pub fn rank_by(mut self, alias: &str) -> Self {
        self.rank_by = Some(alias.to_string());
        self
    }

    pub fn tie_break(mut self, aliases: &[&str]) -> Self {
        self.tie_break = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }

    /// Whether rows are grouped, as opposed to listed one per source row.
    pub fn is_grouped(&self) -> bool {
        !self.measures.is_empty()
    }

    pub fn output_columns(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter_map(|k| k.alias.as_deref())
            .chain(self.measures.iter().map(|m| m.alias.as_str()))
            .collect()
    }

    pub fn resolve_limit(&self, params: &QueryParams) -> Option<u64> {
        match self.limit {
            Limit::None => None,
            Limit::Fixed(n) => Some(n),
            Limit::Param { default } => Some(params.limit.unwrap_or(default)),
        }
    }

    /// Full ORDER BY: ranked measure descending, then the explicit tie-break
    /// columns, the remaining visible keys and finally group-only keys, all
    /// ascending.
    pub fn ordering(&self) -> Vec<SortKey> {
        let mut keys = Vec::new();
        let mut used: HashSet<&str> = HashSet::new();
        if let Some(rank) = &self.rank_by {
            used.insert(rank.as_str());
            keys.push(SortKey {
                target: SortTarget::Output(rank.clone()),
                descending: true,
            });
        }
        let visible = self.keys.iter().filter_map(|k| k.alias.as_deref());
        for alias in self.tie_break.iter().map(String::as_str).chain(visible) {
            if used.insert(alias) {
                keys.push(SortKey {
                    target: SortTarget::Output(alias.to_string()),
                    descending: false,
                });
            }
        }
        for key in self.keys.iter().filter(|k| k.alias.is_none()) {
            keys.push(SortKey {
                target: SortTarget::Hidden(key.column.clone()),
                descending: false,
            });
        }
        keys
    }

    /// Table aliases the spec's column references may use.
    pub fn source_aliases(&self) -> Vec<&str> {
        match &self.source {
            Source::Tables { from, joins } => std::iter::once(from.alias.as_str())
                .chain(joins.iter().map(|j| j.table.alias.as_str()))
                .collect(),
            Source::Stage { alias, .. } => vec![alias.as_str()],
        }
    }

    fn referenced_columns(&self) -> Vec<&ColumnRef> {
        let mut refs: Vec<&ColumnRef> = self.keys.iter().map(|k| &k.column).collect();
        for m in &self.measures {
            refs.extend(m.aggregate.columns());
        }
        if let Source::Tables { joins, .. } = &self.source {
            for j in joins {
                refs.push(&j.left);
                refs.push(&j.right);
            }
        }
        refs
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        let spec = self.name.clone();

        let mut seen = HashSet::new();
        for alias in self.output_columns() {
            if !seen.insert(alias) {
                return Err(SpecError::DuplicateAlias {
                    spec,
                    alias: alias.to_string(),
                });
            }
        }

        if let Some(rank) = &self.rank_by {
            if !self.measures.iter().any(|m| &m.alias == rank) {
                return Err(SpecError::UnknownAlias {
                    spec,
                    alias: rank.clone(),
                });
            }
        }
        for alias in &self.tie_break {
            if !seen.contains(alias.as_str()) {
                return Err(SpecError::UnknownAlias {
                    spec,
                    alias: alias.clone(),
                });
            }
        }

        for (i, m) in self.measures.iter().enumerate() {
            if let Aggregate::Share { of, .. } = &m.aggregate {
                let valid = self.measures[..i]
                    .iter()
                    .any(|prev| &prev.alias == of && !matches!(prev.aggregate, Aggregate::Share { .. }));
                if !valid {
                    return Err(SpecError::InvalidShare {
                        spec,
                        of: of.clone(),
                    });
                }
            }
        }

        if !self.is_grouped() {
            if let Some(k) = self.keys.iter().find(|k| k.alias.is_none()) {
                return Err(SpecError::HiddenKeyWithoutGrouping {
                    spec,
                    column: k.column.column.clone(),
                });
            }
        }

        let aliases = self.source_aliases();
        for r in self.referenced_columns() {
            if !aliases.contains(&r.table.as_str()) {
                return Err(SpecError::UnknownTableAlias {
                    spec,
                    alias: r.table.clone(),
                });
            }
        }

        if let Source::Stage { alias, spec: stage } = &self.source {
            stage.validate()?;
            let produced = stage.output_columns();
            for r in self.referenced_columns() {
                if !produced.contains(&r.column.as_str()) {
                    return Err(SpecError::UnknownStageColumn {
                        spec,
                        stage: alias.clone(),
                        column: r.column.clone(),
                    });
                }
            }
            let stage_keys: Vec<&str> = stage.keys.iter().filter_map(|k| k.alias.as_deref()).collect();
            for key in &self.keys {
                if !stage_keys.contains(&key.column.column.as_str()) {
                    return Err(SpecError::StageKeyMismatch {
                        spec,
                        stage: alias.clone(),
                        key: key.column.column.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_cuisine() -> AggregationSpec {
        AggregationSpec::from_table("by_cuisine", "recipe_table", "r")
            .join(
                "type_cuisine_table",
                "tcu",
                col("r", "type_cuisine_id"),
                col("tcu", "type_cuisine_id"),
            )
            .key(col("tcu", "type_cuisine_name"), "cuisine")
            .measure(Aggregate::Count, "recipe_count")
            .rank_by("recipe_count")
    }

    #[test]
    fn test_ordering_ranks_then_breaks_ties_by_keys() {
        let spec = by_cuisine();
        assert!(spec.validate().is_ok());
        let order = spec.ordering();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].target, SortTarget::Output("recipe_count".into()));
        assert!(order[0].descending);
        assert_eq!(order[1].target, SortTarget::Output("cuisine".into()));
        assert!(!order[1].descending);
    }

    #[test]
    fn test_hidden_keys_sort_last() {
        let spec = AggregationSpec::from_table("per_recipe", "recipe_table", "r")
            .group_only(col("r", "recipe_id"))
            .key(col("r", "recipe_name"), "recipe_name")
            .measure(Aggregate::Count, "n")
            .rank_by("n");
        let order = spec.ordering();
        assert_eq!(order[2].target, SortTarget::Hidden(col("r", "recipe_id")));
        assert_eq!(spec.output_columns(), vec!["recipe_name", "n"]);
    }

    #[test]
    fn test_limit_param_falls_back_to_default() {
        let spec = by_cuisine().limit(Limit::Param { default: 10 });
        assert_eq!(spec.resolve_limit(&QueryParams::default()), Some(10));
        assert_eq!(spec.resolve_limit(&QueryParams::with_limit(2)), Some(2));
    }

    #[test]
    fn test_validate_rejects_unknown_rank() {
        let spec = by_cuisine().rank_by("missing");
        assert!(matches!(spec.validate(), Err(SpecError::UnknownAlias { .. })));
    }

    #[test]
    fn test_validate_rejects_unknown_table_alias() {
        let spec = by_cuisine().key(col("zz", "name"), "name");
        assert!(matches!(
            spec.validate(),
            Err(SpecError::UnknownTableAlias { .. })
        ));
    }

    #[test]
    fn test_validate_share_needs_earlier_measure() {
        let spec = by_cuisine().measure(
            Aggregate::Share {
                of: "nope".into(),
                total: ShareTotal::AllGroups,
            },
            "pct",
        );
        assert!(matches!(spec.validate(), Err(SpecError::InvalidShare { .. })));
    }

    #[test]
    fn test_stage_keys_must_match() {
        let inner = AggregationSpec::from_table("inner", "recipe_table", "r")
            .key(col("r", "type_cuisine_id"), "cuisine")
            .key(col("r", "recipe_id"), "recipe_id")
            .measure(Aggregate::Count, "n");
        let ok = AggregationSpec::from_stage("outer", "s", inner.clone())
            .key(col("s", "cuisine"), "cuisine")
            .measure(Aggregate::Avg(col("s", "n")), "avg_n");
        assert!(ok.validate().is_ok());

        let bad = AggregationSpec::from_stage("outer", "s", inner)
            .key(col("s", "n"), "n_bucket")
            .measure(Aggregate::Count, "c");
        assert!(matches!(
            bad.validate(),
            Err(SpecError::StageKeyMismatch { .. })
        ));
    }
}
