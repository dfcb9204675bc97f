//! Named queries behind the dashboards.

use crate::aggregate::{col, Aggregate, AggregationSpec, Limit, ShareTotal};

/// Query names with their specs, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    specs: Vec<AggregationSpec>,
}

impl Catalog {
    pub fn new(specs: Vec<AggregationSpec>) -> Self {
        Self { specs }
    }

    /// Recipe and shop queries together.
    pub fn standard() -> Self {
        let mut specs = recipe_specs();
        specs.extend(shop_specs());
        Self { specs }
    }

    pub fn get(&self, name: &str) -> Option<&AggregationSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn specs(&self) -> &[AggregationSpec] {
        &self.specs
    }
}

fn recipes() -> AggregationSpec {
    AggregationSpec::from_table("", "recipe_table", "r")
}

fn named(mut spec: AggregationSpec, name: &str) -> AggregationSpec {
    spec.name = name.to_string();
    spec
}

fn with_cuisine(spec: AggregationSpec) -> AggregationSpec {
    spec.join(
        "type_cuisine_table",
        "tcu",
        col("r", "type_cuisine_id"),
        col("tcu", "type_cuisine_id"),
    )
}

fn with_course(spec: AggregationSpec) -> AggregationSpec {
    spec.join(
        "type_course_table",
        "tc",
        col("r", "type_course_id"),
        col("tc", "type_course_id"),
    )
}

fn with_diet(spec: AggregationSpec) -> AggregationSpec {
    spec.join(
        "type_diet_name",
        "td",
        col("r", "type_diet_id"),
        col("td", "type_diet_id"),
    )
}

fn usage() -> AggregationSpec {
    AggregationSpec::from_table("", "recipe_ingredient_table", "ri").join(
        "ingredient_table",
        "i",
        col("ri", "ingredient_id"),
        col("i", "ingredient_id"),
    )
}

/// Queries over the multicultural recipe schema.
pub fn recipe_specs() -> Vec<AggregationSpec> {
    let per_recipe = with_cuisine(recipes())
        .join(
            "recipe_ingredient_table",
            "ri",
            col("r", "recipe_id"),
            col("ri", "recipe_id"),
        )
        .key(col("tcu", "type_cuisine_name"), "cuisine")
        .key(col("r", "recipe_id"), "recipe_id")
        .measure(Aggregate::CountOf(col("ri", "ingredient_id")), "ingredient_count");

    vec![
        AggregationSpec::from_table("view_ingredient", "ingredient_table", "i")
            .key(col("i", "ingredient_id"), "ingredient_id")
            .key(col("i", "ingredient_name"), "ingredient_name")
            .tie_break(&["ingredient_name"]),
        named(
            AggregationSpec::from_table("", "recipe_ingredient_table", "ri")
                .join("recipe_table", "r", col("ri", "recipe_id"), col("r", "recipe_id"))
                .join(
                    "ingredient_table",
                    "i",
                    col("ri", "ingredient_id"),
                    col("i", "ingredient_id"),
                )
                .key(col("ri", "recipe_ingredient_id"), "recipe_ingredient_id")
                .key(col("r", "recipe_name"), "recipe_name")
                .key(col("i", "ingredient_name"), "ingredient_name"),
            "view_recipe_ingredient",
        ),
        named(
            with_diet(with_cuisine(with_course(recipes())))
                .key(col("r", "recipe_id"), "recipe_id")
                .key(col("r", "recipe_name"), "recipe_name")
                .key(col("tc", "type_course_name"), "type_course_name")
                .key(col("tcu", "type_cuisine_name"), "type_cuisine_name")
                .key(col("td", "type_diet_name"), "type_diet_name")
                .tie_break(&["recipe_name"]),
            "view_recipe",
        ),
        named(
            with_cuisine(recipes())
                .key(col("tcu", "type_cuisine_name"), "cuisine")
                .measure(Aggregate::Count, "recipe_count")
                .rank_by("recipe_count"),
            "recipe_count_by_cuisine",
        ),
        named(
            with_course(with_cuisine(recipes()))
                .key(col("tcu", "type_cuisine_name"), "cuisine")
                .measure(
                    Aggregate::CountDistinct(col("tc", "type_course_name")),
                    "category_count",
                )
                .measure(Aggregate::Count, "recipe_count")
                .rank_by("category_count"),
            "recipe_category_count_by_cuisine",
        ),
        named(
            usage()
                .key(col("i", "ingredient_name"), "ingredient_name")
                .measure(Aggregate::Count, "usage_count")
                .rank_by("usage_count")
                .limit(Limit::Param { default: 10 }),
            "top_ingredients",
        ),
        named(
            usage()
                .key(col("i", "ingredient_name"), "ingredient_name")
                .measure(Aggregate::Count, "total_usage")
                .measure(Aggregate::CountDistinct(col("ri", "recipe_id")), "recipe_count")
                .rank_by("total_usage"),
            "ingredient_usage_distribution",
        ),
        named(
            recipes()
                .join(
                    "recipe_ingredient_table",
                    "ri",
                    col("r", "recipe_id"),
                    col("ri", "recipe_id"),
                )
                .group_only(col("r", "recipe_id"))
                .key(col("r", "recipe_name"), "recipe_name")
                .measure(Aggregate::CountOf(col("ri", "ingredient_id")), "ingredient_count")
                .rank_by("ingredient_count"),
            "ingredient_count_per_recipe",
        ),
        AggregationSpec::from_stage("ingredient_count_stats_by_cuisine", "per_recipe", named(per_recipe, "per_recipe"))
            .key(col("per_recipe", "cuisine"), "cuisine")
            .measure(
                Aggregate::Avg(col("per_recipe", "ingredient_count")),
                "avg_ingredient_per_recipe",
            )
            .measure(
                Aggregate::Min(col("per_recipe", "ingredient_count")),
                "min_ingredient_per_recipe",
            )
            .measure(
                Aggregate::Max(col("per_recipe", "ingredient_count")),
                "max_ingredient_per_recipe",
            )
            .measure(Aggregate::Count, "recipe_count")
            .rank_by("avg_ingredient_per_recipe"),
        named(
            with_diet(recipes())
                .key(col("td", "type_diet_name"), "diet")
                .measure(Aggregate::Count, "recipe_count")
                .rank_by("recipe_count"),
            "recipe_count_by_diet",
        ),
        named(
            with_diet(recipes())
                .key(col("td", "type_diet_name"), "diet")
                .measure(Aggregate::Count, "recipe_count")
                .measure(
                    Aggregate::Share {
                        of: "recipe_count".to_string(),
                        total: ShareTotal::AllGroups,
                    },
                    "percentage_share",
                )
                .rank_by("recipe_count"),
            "recipe_share_by_diet",
        ),
        named(
            usage()
                .key(col("i", "ingredient_name"), "ingredient_name")
                .measure(Aggregate::CountDistinct(col("ri", "recipe_id")), "recipe_count")
                .measure(Aggregate::Count, "total_usage")
                .measure(
                    Aggregate::Share {
                        of: "recipe_count".to_string(),
                        total: ShareTotal::RowsOf("recipe_table".to_string()),
                    },
                    "recipe_coverage_pct",
                )
                .rank_by("recipe_count"),
            "ingredient_recipe_stats",
        ),
        named(
            with_diet(with_cuisine(with_course(recipes().join(
                "recipe_ingredient_table",
                "ri",
                col("r", "recipe_id"),
                col("ri", "recipe_id"),
            ))))
            .key(col("r", "recipe_name"), "recipe_name")
            .key(col("tc", "type_course_name"), "type_course_name")
            .key(col("tcu", "type_cuisine_name"), "type_cuisine_name")
            .key(col("td", "type_diet_name"), "type_diet_name")
            .measure(Aggregate::CountOf(col("ri", "ingredient_id")), "ingredient_count")
            .tie_break(&["recipe_name"]),
            "recipe_overview_with_ingredient_count",
        ),
    ]
}

fn order_lines() -> AggregationSpec {
    AggregationSpec::from_table("", "order_details", "od").join(
        "products",
        "p",
        col("od", "product_id"),
        col("p", "product_id"),
    )
}

/// Queries over the customers / products / orders schema.
pub fn shop_specs() -> Vec<AggregationSpec> {
    vec![
        AggregationSpec::from_table("view_customers", "customers", "c")
            .key(col("c", "customer_id"), "customer_id")
            .key(col("c", "name"), "name")
            .key(col("c", "email"), "email")
            .key(col("c", "phone"), "phone")
            .key(col("c", "address"), "address")
            .key(col("c", "birthdate"), "birthdate"),
        AggregationSpec::from_table("view_products", "products", "p")
            .key(col("p", "product_id"), "product_id")
            .key(col("p", "name"), "name")
            .key(col("p", "description"), "description")
            .key(col("p", "price"), "price")
            .key(col("p", "stock"), "stock"),
        AggregationSpec::from_table("view_orders_with_customers", "orders", "o")
            .join("customers", "c", col("o", "customer_id"), col("c", "customer_id"))
            .key(col("o", "order_id"), "order_id")
            .key(col("o", "order_date"), "order_date")
            .key(col("o", "total_amount"), "total_amount")
            .key(col("c", "name"), "customer_name")
            .key(col("c", "phone"), "phone"),
        named(
            order_lines()
                .join("orders", "o", col("od", "order_id"), col("o", "order_id"))
                .join("customers", "c", col("o", "customer_id"), col("c", "customer_id"))
                .key(col("od", "order_detail_id"), "order_detail_id")
                .key(col("o", "order_id"), "order_id")
                .key(col("o", "order_date"), "order_date")
                .key(col("c", "customer_id"), "customer_id")
                .key(col("c", "name"), "customer_name")
                .key(col("p", "product_id"), "product_id")
                .key(col("p", "name"), "product_name")
                .key(col("od", "unit_price"), "unit_price")
                .key(col("od", "quantity"), "quantity")
                .key(col("od", "subtotal"), "subtotal")
                .key(col("o", "total_amount"), "order_total")
                .key(col("c", "phone"), "phone"),
            "view_order_details_with_info",
        ),
        named(
            order_lines()
                .key(col("p", "name"), "product_name")
                .measure(Aggregate::Sum(col("od", "quantity")), "quantity")
                .rank_by("quantity")
                .limit(Limit::Param { default: 10 }),
            "top_products_by_quantity",
        ),
        named(
            order_lines()
                .key(col("p", "name"), "product_name")
                .measure(Aggregate::Sum(col("od", "quantity")), "units")
                .measure(Aggregate::Sum(col("od", "subtotal")), "revenue")
                .measure(
                    Aggregate::Ratio {
                        numerator: col("od", "subtotal"),
                        denominator: col("od", "quantity"),
                    },
                    "avg_unit_price",
                )
                .rank_by("revenue"),
            "revenue_by_product",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_spec_validates() {
        for spec in Catalog::standard().specs() {
            assert!(spec.validate().is_ok(), "{} failed: {:?}", spec.name, spec.validate());
        }
    }

    #[test]
    fn test_names_are_unique() {
        let catalog = Catalog::standard();
        let mut names = catalog.names();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 19);
    }

    #[test]
    fn test_lookup() {
        let catalog = Catalog::standard();
        let spec = catalog.get("recipe_share_by_diet").unwrap();
        assert_eq!(spec.output_columns(), vec!["diet", "recipe_count", "percentage_share"]);
        assert!(catalog.get("drop_tables").is_none());
    }
}
