use crate::change::PayloadType;
use crate::changelog::Changelog;
use crate::query::result::{document_link, unordered_list};
use crate::query::{Query, QueryDefinition, QueryError, QuerySite};
use crate::stages::LinksModel;
use parking_lot::RwLock;
use std::sync::Arc;

/// Lists the documents linking to the hosting document.
pub struct BacklinksQuery {
    links: Arc<RwLock<LinksModel>>,
}

impl BacklinksQuery {
    pub fn new(links: Arc<RwLock<LinksModel>>) -> Self {
        Self { links }
    }
}

impl Query for BacklinksQuery {
    fn name(&self) -> &str {
        "backlinks"
    }

    fn description(&self) -> &str {
        "Lists all documents that link to the current document."
    }

    fn is_impacted_by(&self, changelog: &Changelog, site: &QuerySite) -> bool {
        changelog.changes_of(PayloadType::Link).any(|change| {
            change
                .value()
                .as_link()
                .is_some_and(|link| *link.target == *site.document().name())
        })
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError> {
        let backlinks = self.links.read().backlinks(definition.document().name());
        if backlinks.is_empty() {
            return Ok("No backlinks.".to_string());
        }
        Ok(unordered_list(
            backlinks.iter().map(|source| document_link(source)),
        ))
    }
}
