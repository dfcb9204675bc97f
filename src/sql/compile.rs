//! Aggregation spec to SQL text.

use super::Dialect;
use crate::aggregate::{
    Aggregate, AggregationSpec, ColumnRef, Measure, QueryParams, ShareTotal, SortTarget, Source,
};
use crate::value::Value;

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compile `spec` for `dialect`. `Dialect::Auto` compiles as generic SQL.
pub fn compile(spec: &AggregationSpec, params: &QueryParams, dialect: Dialect) -> CompiledQuery {
    let mut compiler = Compiler {
        dialect: match dialect {
            Dialect::Auto => Dialect::Generic,
            other => other,
        },
        params: Vec::new(),
    };
    let sql = match &spec.source {
        Source::Stage { alias, spec: stage } => {
            let inner = compiler.select(stage, params);
            let outer = compiler.select(spec, params);
            format!("WITH {} AS (\n{}\n)\n{}", alias, indent(&inner), outer)
        }
        Source::Tables { .. } => compiler.select(spec, params),
    };
    CompiledQuery {
        sql,
        params: compiler.params,
    }
}

struct Compiler {
    dialect: Dialect,
    params: Vec<Value>,
}

impl Compiler {
    fn select(&mut self, spec: &AggregationSpec, params: &QueryParams) -> String {
        let mut select_list: Vec<String> = spec
            .keys
            .iter()
            .filter_map(|k| {
                k.alias
                    .as_ref()
                    .map(|a| format!("{} AS {}", column(&k.column), a))
            })
            .collect();
        for m in &spec.measures {
            select_list.push(format!("{} AS {}", self.measure(spec, m), m.alias));
        }

        let mut sql = format!("SELECT {}\n", select_list.join(", "));
        match &spec.source {
            Source::Tables { from, joins } => {
                sql.push_str(&format!("FROM {} AS {}\n", from.name, from.alias));
                for j in joins {
                    sql.push_str(&format!(
                        "JOIN {} AS {} ON {} = {}\n",
                        j.table.name,
                        j.table.alias,
                        column(&j.left),
                        column(&j.right)
                    ));
                }
            }
            Source::Stage { alias, .. } => sql.push_str(&format!("FROM {}\n", alias)),
        }

        if spec.is_grouped() && !spec.keys.is_empty() {
            let group: Vec<String> = spec.keys.iter().map(|k| column(&k.column)).collect();
            sql.push_str(&format!("GROUP BY {}\n", group.join(", ")));
        }

        let order: Vec<String> = spec
            .ordering()
            .iter()
            .map(|key| {
                let target = match &key.target {
                    SortTarget::Output(alias) => alias.clone(),
                    SortTarget::Hidden(c) => column(c),
                };
                let direction = if key.descending { "DESC" } else { "ASC" };
                if self.dialect.supports_nulls_last() {
                    format!("{} {} NULLS LAST", target, direction)
                } else {
                    format!("{} {}", target, direction)
                }
            })
            .collect();
        if !order.is_empty() {
            sql.push_str(&format!("ORDER BY {}\n", order.join(", ")));
        }

        if let Some(limit) = spec.resolve_limit(params) {
            self.params.push(Value::Int(limit as i64));
            sql.push_str(&format!("LIMIT {}\n", self.dialect.placeholder(self.params.len())));
        }

        sql.trim_end().to_string()
    }

    fn measure(&self, spec: &AggregationSpec, measure: &Measure) -> String {
        match &measure.aggregate {
            Aggregate::Count => "COUNT(*)".to_string(),
            Aggregate::CountOf(c) => format!("COUNT({})", column(c)),
            Aggregate::CountDistinct(c) => format!("COUNT(DISTINCT {})", column(c)),
            Aggregate::Sum(c) => format!("SUM({})", column(c)),
            Aggregate::Avg(c) => format!("AVG({})", self.dialect.decimal_cast(&column(c))),
            Aggregate::Min(c) => format!("MIN({})", column(c)),
            Aggregate::Max(c) => format!("MAX({})", column(c)),
            Aggregate::Ratio {
                numerator,
                denominator,
            } => format!(
                "{} / NULLIF(SUM({}), 0)",
                self.dialect
                    .decimal_cast(&format!("SUM({})", column(numerator))),
                column(denominator)
            ),
            Aggregate::Share { of, total } => {
                // validate() guarantees `of` names an earlier plain measure.
                let base = spec
                    .measures
                    .iter()
                    .find(|m| &m.alias == of)
                    .map(|m| self.measure(spec, m))
                    .unwrap_or_else(|| of.clone());
                let denominator = match total {
                    ShareTotal::AllGroups => format!("SUM({}) OVER ()", base),
                    ShareTotal::RowsOf(table) => format!("(SELECT COUNT(*) FROM {})", table),
                };
                format!(
                    "ROUND({} / NULLIF({}, 0) * 100, 2)",
                    self.dialect.decimal_cast(&base),
                    denominator
                )
            }
        }
    }
}

fn column(c: &ColumnRef) -> String {
    format!("{}.{}", c.table, c.column)
}

fn indent(sql: &str) -> String {
    sql.lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{col, Limit};

    fn top_ingredients() -> AggregationSpec {
        AggregationSpec::from_table("top_ingredients", "recipe_ingredient_table", "ri")
            .join(
                "ingredient_table",
                "i",
                col("ri", "ingredient_id"),
                col("i", "ingredient_id"),
            )
            .key(col("i", "ingredient_name"), "ingredient_name")
            .measure(Aggregate::Count, "usage_count")
            .rank_by("usage_count")
            .limit(Limit::Param { default: 10 })
    }

    #[test]
    fn test_compile_grouped_query() {
        let q = compile(&top_ingredients(), &QueryParams::with_limit(2), Dialect::DuckDB);
        assert_eq!(
            q.sql,
            "SELECT i.ingredient_name AS ingredient_name, COUNT(*) AS usage_count\n\
             FROM recipe_ingredient_table AS ri\n\
             JOIN ingredient_table AS i ON ri.ingredient_id = i.ingredient_id\n\
             GROUP BY i.ingredient_name\n\
             ORDER BY usage_count DESC NULLS LAST, ingredient_name ASC NULLS LAST\n\
             LIMIT ?"
        );
        assert_eq!(q.params, vec![Value::Int(2)]);
    }

    #[test]
    fn test_postgres_placeholders_and_casts() {
        let spec = AggregationSpec::from_table("share", "recipe_table", "r")
            .key(col("r", "type_diet_id"), "diet")
            .measure(Aggregate::Count, "recipe_count")
            .measure(
                Aggregate::Share {
                    of: "recipe_count".into(),
                    total: ShareTotal::AllGroups,
                },
                "percentage_share",
            )
            .rank_by("recipe_count")
            .limit(Limit::Fixed(5));
        let q = compile(&spec, &QueryParams::default(), Dialect::PostgreSQL);
        assert!(q.sql.contains(
            "ROUND(CAST(COUNT(*) AS NUMERIC) / NULLIF(SUM(COUNT(*)) OVER (), 0) * 100, 2) AS percentage_share"
        ));
        assert!(q.sql.ends_with("LIMIT $1"));
        assert_eq!(q.params, vec![Value::Int(5)]);
    }

    #[test]
    fn test_mysql_skips_nulls_last() {
        let q = compile(&top_ingredients(), &QueryParams::default(), Dialect::MySQL);
        assert!(!q.sql.contains("NULLS LAST"));
        assert_eq!(q.params, vec![Value::Int(10)]);
    }

    #[test]
    fn test_stage_becomes_cte() {
        let inner = AggregationSpec::from_table("per_recipe", "recipe_ingredient_table", "ri")
            .key(col("ri", "recipe_id"), "recipe_id")
            .measure(Aggregate::Count, "ingredient_count");
        let outer = AggregationSpec::from_stage("stats", "counts", inner)
            .measure(Aggregate::Max(col("counts", "ingredient_count")), "max_count");
        let q = compile(&outer, &QueryParams::default(), Dialect::Generic);
        assert!(q.sql.starts_with("WITH counts AS (\n    SELECT ri.recipe_id AS recipe_id"));
        assert!(q.sql.ends_with("FROM counts"));
        assert!(!q.sql.contains("GROUP BY counts"));
    }

    #[test]
    fn test_rows_of_share_uses_subquery() {
        let spec = AggregationSpec::from_table("coverage", "recipe_ingredient_table", "ri")
            .key(col("ri", "ingredient_id"), "ingredient_id")
            .measure(Aggregate::CountDistinct(col("ri", "recipe_id")), "recipe_count")
            .measure(
                Aggregate::Share {
                    of: "recipe_count".into(),
                    total: ShareTotal::RowsOf("recipe_table".into()),
                },
                "recipe_coverage_pct",
            );
        let q = compile(&spec, &QueryParams::default(), Dialect::Generic);
        assert!(q.sql.contains("NULLIF((SELECT COUNT(*) FROM recipe_table), 0)"));
    }
}
