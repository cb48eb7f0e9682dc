use super::builtin::{HelpQuery, UnknownQuery};
use super::Query;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// All queries available in a vault, by name.
pub struct QueryCatalog {
    queries: BTreeMap<String, Arc<dyn Query>>,
}

impl QueryCatalog {
    /// A catalog holding only the help query.
    pub fn new() -> Self {
        let mut catalog = Self {
            queries: BTreeMap::new(),
        };
        catalog.register(Arc::new(HelpQuery));
        catalog
    }

    /// Adds a query. The first registration of a name wins.
    pub fn register(&mut self, query: Arc<dyn Query>) -> bool {
        let name = query.name().to_ascii_lowercase();
        if self.queries.contains_key(&name) {
            warn!(
                "Query '{}' is registered more than once; keeping the first one",
                name
            );
            return false;
        }
        self.queries.insert(name, query);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Query>> {
        self.queries.get(name)
    }

    /// The query called `name`, or one that explains it does not exist.
    pub fn query(&self, name: &str) -> Arc<dyn Query> {
        match self.queries.get(name) {
            Some(query) => query.clone(),
            None => Arc::new(UnknownQuery::new(name)),
        }
    }

    /// Registered queries in name order.
    pub fn queries(&self) -> impl Iterator<Item = &Arc<dyn Query>> {
        self.queries.values()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self::new()
    }
}
