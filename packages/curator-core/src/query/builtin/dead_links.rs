use crate::change::{Change, PayloadType};
use crate::changelog::Changelog;
use crate::query::result::unordered_list;
use crate::query::{Query, QueryDefinition, QueryError, QuerySite};
use crate::stages::LinksModel;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Lists the link targets of the hosting document that do not exist.
pub struct DeadLinksQuery {
    links: Arc<RwLock<LinksModel>>,
}

impl DeadLinksQuery {
    pub fn new(links: Arc<RwLock<LinksModel>>) -> Self {
        Self { links }
    }
}

impl Query for DeadLinksQuery {
    fn name(&self) -> &str {
        "deadlinks"
    }

    fn description(&self) -> &str {
        "Lists all links in the current document that point to documents not in the vault."
    }

    /// Own links changed, or documents appeared or disappeared somewhere,
    /// one at a time or a folder at once.
    fn is_impacted_by(&self, changelog: &Changelog, site: &QuerySite) -> bool {
        let own_links = changelog.changes_of(PayloadType::Link).any(|change| {
            change
                .value()
                .as_link()
                .is_some_and(|link| *link.source == *site.document().name())
        });
        own_links
            || changelog.contains(PayloadType::Folder)
            || changelog
                .changes_of(PayloadType::Document)
                .any(|change| !matches!(change, Change::Update { .. }))
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError> {
        let model = self.links.read();
        let dead: BTreeSet<&str> = model
            .outgoing(definition.document().name())
            .iter()
            .map(|link| &*link.target)
            .filter(|target| !definition.vault.contains_document(target))
            .collect();
        if dead.is_empty() {
            return Ok("No dead links.".to_string());
        }
        Ok(unordered_list(dead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Payload;
    use crate::front_matter::FrontMatterCollector;
    use crate::parallel::PassContext;
    use crate::pipeline::{Stage, StageContext};
    use crate::query::QueryCatalog;
    use crate::stages::LinksStage;
    use crate::vault::{Document, Vault};

    fn run(vault: &Vault) -> String {
        let links = Arc::new(RwLock::new(LinksModel::new()));
        let front_matter = FrontMatterCollector::new();
        let pass = PassContext::new(Arc::from("test"), 1);
        let context = StageContext::new(vault, &front_matter, &pass);
        LinksStage::new(links.clone())
            .run(&Changelog::of(Change::create(Payload::Vault)), &context)
            .unwrap();

        let site = vault.query_sites().remove(0);
        let catalog = QueryCatalog::new();
        DeadLinksQuery::new(links)
            .run(&QueryDefinition::new(&site, vault, &catalog))
            .unwrap()
    }

    #[test]
    fn test_lists_missing_targets_once() {
        let mut vault = Vault::new("test");
        vault.insert_document(Document::parse(
            "doc",
            "",
            0,
            "<!--query:deadlinks-->\n<!--/query-->\n[[Zeta]] [[Other]] [[Alpha]] [[Zeta#s]]\n",
        ));
        vault.insert_document(Document::parse("Other", "", 0, "\n"));
        assert_eq!(run(&vault), "- Alpha\n- Zeta");
    }

    #[test]
    fn test_no_dead_links() {
        let mut vault = Vault::new("test");
        vault.insert_document(Document::parse(
            "doc",
            "",
            0,
            "<!--query:deadlinks-->\n<!--/query-->\n[[doc]]\n",
        ));
        assert_eq!(run(&vault), "No dead links.");
    }

    #[test]
    fn test_impacted_by_new_documents_but_not_edits() {
        let mut vault = Vault::new("test");
        vault.insert_document(Document::parse(
            "doc",
            "",
            0,
            "<!--query:deadlinks-->\n<!--/query-->\n",
        ));
        let site = vault.query_sites().remove(0);
        let query = DeadLinksQuery::new(Arc::new(RwLock::new(LinksModel::new())));
        let other = Arc::new(Document::parse("other", "", 0, "\n"));

        assert!(query.is_impacted_by(
            &Changelog::of(Change::create(Payload::Document(other.clone()))),
            &site
        ));
        assert!(!query.is_impacted_by(
            &Changelog::of(Change::touch(Payload::Document(other))),
            &site
        ));
    }

    #[test]
    fn test_impacted_by_folder_changes() {
        let mut vault = Vault::new("test");
        vault.insert_document(Document::parse(
            "doc",
            "",
            0,
            "<!--query:deadlinks-->\n<!--/query-->\n",
        ));
        let site = vault.query_sites().remove(0);
        let query = DeadLinksQuery::new(Arc::new(RwLock::new(LinksModel::new())));

        assert!(query.is_impacted_by(
            &Changelog::of(Change::delete(Payload::Folder(Arc::from("archive")))),
            &site
        ));
        assert!(query.is_impacted_by(
            &Changelog::of(Change::create(Payload::Folder(Arc::from("archive")))),
            &site
        ));
    }
}
