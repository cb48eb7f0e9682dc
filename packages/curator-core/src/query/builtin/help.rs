use crate::query::result::table;
use crate::query::{Query, QueryCatalog, QueryDefinition, QueryError};
use std::collections::BTreeMap;

/// Describes the queries in the catalog.
pub struct HelpQuery;

impl Query for HelpQuery {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Shows information about the queries available in this vault."
    }

    fn supported_configuration(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([("name", "Name of the query to show help for.")])
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError> {
        let catalog = definition.catalog;
        let Some(name) = definition.configuration().string("name") else {
            return Ok(format!(
                "Use this query to get help on the queries in this vault.\n\n{}",
                available_queries(catalog)
            ));
        };
        let name = name.trim().to_ascii_lowercase();
        let Some(query) = catalog.get(&name) else {
            return Ok(unknown_query_text(&name, catalog));
        };

        let configuration = query.supported_configuration();
        let settings = if configuration.is_empty() {
            "This query does not take any configuration.".to_string()
        } else {
            format!(
                "Configuration:\n\n{}",
                table(
                    &["Key", "Description"],
                    configuration.iter().map(|(key, text)| vec![*key, *text])
                )
            )
        };
        Ok(format!(
            "### Query `{}`\n\n{}\n\n{}",
            query.name(),
            query.description(),
            settings
        ))
    }
}

pub(crate) fn available_queries(catalog: &QueryCatalog) -> String {
    let entries: Vec<String> = catalog
        .queries()
        .map(|q| format!("- **{}**: {}", q.name(), q.description()))
        .collect();
    format!(
        "Queries available in this vault are:\n\n{}\n\nUse the 'help' query to get more information on a specific query.",
        entries.join("\n")
    )
}

pub(crate) fn unknown_query_text(name: &str, catalog: &QueryCatalog) -> String {
    format!(
        "Unknown query '{}'.\n\n{}",
        name,
        available_queries(catalog)
    )
}
