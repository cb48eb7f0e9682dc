use super::help::unknown_query_text;
use crate::query::{Query, QueryDefinition, QueryError};

/// Stands in for a query name that is not in the catalog, so the reader of
/// the document learns which names are valid.
pub struct UnknownQuery {
    name: String,
}

impl UnknownQuery {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Query for UnknownQuery {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Unknown query"
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError> {
        Ok(unknown_query_text(&self.name, definition.catalog))
    }
}
