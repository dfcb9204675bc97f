//! Named, memoized queries and the panels dashboards draw from them.

use crate::aggregate::QueryParams;
use crate::catalog::Catalog;
use crate::store::Store;
use crate::table::Table;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum QueryError {
    #[error("Data unavailable for {query}: {reason}")]
    DataUnavailable { query: String, reason: String },
}

/// What a dashboard region shows for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Ready(Table),
    /// The query ran and matched nothing.
    Empty { message: String },
    Unavailable { message: String },
}

impl Panel {
    pub fn table(&self) -> Option<&Table> {
        match self {
            Panel::Ready(table) => Some(table),
            _ => None,
        }
    }
}

pub struct QueryLayer {
    store: Box<dyn Store>,
    catalog: Catalog,
    memo: HashMap<(String, QueryParams), Table>,
}

impl QueryLayer {
    pub fn new(store: Box<dyn Store>, catalog: Catalog) -> Self {
        Self {
            store,
            catalog,
            memo: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run a named query, or return the result memoized for the same params.
    ///
    /// Failures are never memoized; the next call tries the store again.
    pub fn fetch(&mut self, name: &str, params: &QueryParams) -> Result<Table, QueryError> {
        let key = (name.to_string(), *params);
        if let Some(table) = self.memo.get(&key) {
            debug!(query = name, "memo hit");
            return Ok(table.clone());
        }

        let unavailable = |reason: String| {
            warn!(query = name, %reason, "query failed");
            QueryError::DataUnavailable {
                query: name.to_string(),
                reason,
            }
        };
        let spec = self
            .catalog
            .get(name)
            .ok_or_else(|| unavailable("unknown query".to_string()))?;
        let table = {
            let mut conn = self
                .store
                .acquire()
                .map_err(|e| unavailable(e.to_string()))?;
            conn.run(spec, params).map_err(|e| unavailable(e.to_string()))?
        };

        info!(
            query = name,
            store = %self.store.describe(),
            rows = table.row_count(),
            "query ran"
        );
        self.memo.insert(key, table.clone());
        Ok(table)
    }

    /// Fetch and fold the outcome into a panel.
    pub fn load(&mut self, name: &str, params: &QueryParams) -> Panel {
        match self.fetch(name, params) {
            Ok(table) if table.is_empty() => Panel::Empty {
                message: format!("No data to show for {}", name),
            },
            Ok(table) => Panel::Ready(table),
            Err(e) => Panel::Unavailable {
                message: e.to_string(),
            },
        }
    }

    pub fn clear_cache(&mut self) {
        debug!(entries = self.memo.len(), "clearing query memo");
        self.memo.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.memo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Dialect;
    use crate::store::MemoryStore;
    use crate::value::Value;

    const FIXTURE: &str = "
        CREATE TABLE type_cuisine_table (type_cuisine_id INT, type_cuisine_name TEXT);
        CREATE TABLE recipe_table (recipe_id INT, recipe_name TEXT, type_cuisine_id INT);
        INSERT INTO type_cuisine_table VALUES (1, 'A'), (2, 'B');
        INSERT INTO recipe_table VALUES (1, 'x', 1), (2, 'y', 1), (3, 'z', 1), (4, 'w', 2);
    ";

    fn layer() -> QueryLayer {
        let store = MemoryStore::from_sql(FIXTURE, Dialect::Generic).unwrap();
        QueryLayer::new(Box::new(store), Catalog::standard())
    }

    #[test]
    fn test_fetch_memoizes_by_name_and_params() {
        let mut layer = layer();
        let first = layer
            .fetch("recipe_count_by_cuisine", &QueryParams::default())
            .unwrap();
        assert_eq!(layer.cached_entries(), 1);
        let again = layer
            .fetch("recipe_count_by_cuisine", &QueryParams::default())
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(
            first.column("recipe_count").unwrap().values,
            vec![Value::Int(3), Value::Int(1)]
        );

        layer
            .fetch("recipe_count_by_cuisine", &QueryParams::with_limit(1))
            .unwrap();
        assert_eq!(layer.cached_entries(), 2);

        layer.clear_cache();
        assert_eq!(layer.cached_entries(), 0);
    }

    #[test]
    fn test_unknown_query_is_unavailable() {
        let mut layer = layer();
        let err = layer.fetch("nope", &QueryParams::default()).unwrap_err();
        assert!(matches!(err, QueryError::DataUnavailable { query, .. } if query == "nope"));
        assert_eq!(layer.cached_entries(), 0);
    }

    #[test]
    fn test_missing_table_renders_unavailable_panel() {
        let mut layer = layer();
        match layer.load("top_ingredients", &QueryParams::default()) {
            Panel::Unavailable { message } => assert!(message.contains("recipe_ingredient_table")),
            other => panic!("expected unavailable panel, got {:?}", other),
        }
    }

    #[test]
    fn test_offline_store_renders_unavailable_panel() {
        let mut layer = QueryLayer::new(Box::new(MemoryStore::offline()), Catalog::standard());
        assert!(matches!(
            layer.load("recipe_count_by_cuisine", &QueryParams::default()),
            Panel::Unavailable { .. }
        ));
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let store = MemoryStore::from_sql(
            "CREATE TABLE type_cuisine_table (type_cuisine_id INT, type_cuisine_name TEXT);
             CREATE TABLE recipe_table (recipe_id INT, recipe_name TEXT, type_cuisine_id INT);",
            Dialect::Generic,
        )
        .unwrap();
        let mut layer = QueryLayer::new(Box::new(store), Catalog::standard());
        assert!(matches!(
            layer.load("recipe_count_by_cuisine", &QueryParams::default()),
            Panel::Empty { .. }
        ));
    }
}
