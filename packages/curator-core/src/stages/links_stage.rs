//! Maintains the graph of wiki links between documents.

use crate::change::{Change, Payload, PayloadSet, PayloadType};
use crate::changelog::ChangeCollector;
use crate::error::Result;
use crate::pipeline::{Stage, StageContext};
use crate::vault::{Document, InternalLink};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Outgoing links per document and, derived from them, backlinks per target.
#[derive(Debug, Default)]
pub struct LinksModel {
    outgoing: HashMap<Arc<str>, Vec<InternalLink>>,
    incoming: HashMap<Arc<str>, BTreeSet<Arc<str>>>,
}

impl LinksModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outgoing(&self, source: &str) -> &[InternalLink] {
        self.outgoing.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of the documents linking to `target`, sorted.
    pub fn backlinks(&self, target: &str) -> Vec<Arc<str>> {
        self.incoming
            .get(target)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn backlink_count(&self, target: &str) -> usize {
        self.incoming.get(target).map_or(0, BTreeSet::len)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<str>> {
        self.outgoing.keys()
    }

    pub fn link_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    fn clear(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();
    }

    /// Replaces the links of `source`; returns (removed, added).
    fn replace(
        &mut self,
        source: &Arc<str>,
        links: Vec<InternalLink>,
    ) -> (Vec<InternalLink>, Vec<InternalLink>) {
        let previous = self.remove(source);
        let before: BTreeSet<&InternalLink> = previous.iter().collect();
        let after: BTreeSet<&InternalLink> = links.iter().collect();
        let removed = before.difference(&after).map(|l| (*l).clone()).collect();
        let added = after.difference(&before).map(|l| (*l).clone()).collect();

        for link in &links {
            self.incoming
                .entry(link.target.clone())
                .or_default()
                .insert(source.clone());
        }
        if !links.is_empty() {
            self.outgoing.insert(source.clone(), links);
        }
        (removed, added)
    }

    fn remove(&mut self, source: &str) -> Vec<InternalLink> {
        let Some(links) = self.outgoing.remove(source) else {
            return Vec::new();
        };
        for link in &links {
            if let Some(sources) = self.incoming.get_mut(&link.target) {
                sources.remove(source);
                if sources.is_empty() {
                    self.incoming.remove(&link.target);
                }
            }
        }
        links
    }
}

/// Keeps a [`LinksModel`] in sync with the vault and reports link changes.
pub struct LinksStage {
    model: Arc<RwLock<LinksModel>>,
}

impl LinksStage {
    pub fn new(model: Arc<RwLock<LinksModel>>) -> Self {
        Self { model }
    }

    fn index(&self, document: &Document, output: &mut ChangeCollector) {
        let (removed, added) = self
            .model
            .write()
            .replace(document.name_arc(), document.links());
        emit(removed, added, output);
    }
}

fn emit(removed: Vec<InternalLink>, added: Vec<InternalLink>, output: &mut ChangeCollector) {
    for link in removed {
        output.delete(Payload::Link(link));
    }
    for link in added {
        output.create(Payload::Link(link));
    }
}

impl Stage for LinksStage {
    fn name(&self) -> &str {
        "links"
    }

    fn consumes(&self) -> PayloadSet {
        PayloadSet::RESERVED
    }

    fn produces(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Link])
    }

    fn refresh(&mut self, context: &StageContext<'_>, output: &mut ChangeCollector) -> Result<()> {
        self.model.write().clear();
        for document in context.vault.documents() {
            self.index(document, output);
        }
        debug!(
            "Indexed {} links in {} documents",
            self.model.read().link_count(),
            context.vault.document_count()
        );
        Ok(())
    }

    fn apply(
        &mut self,
        change: &Change,
        context: &StageContext<'_>,
        output: &mut ChangeCollector,
    ) -> Result<()> {
        match (change, change.value()) {
            (Change::Delete(_), Payload::Document(document)) => {
                let removed = self.model.write().remove(document.name());
                emit(removed, Vec::new(), output);
            }
            (_, Payload::Document(document)) => self.index(document, output),
            (Change::Delete(_), Payload::Folder(_)) => {
                // The vault already dropped the folder's documents.
                let stale: Vec<Arc<str>> = self
                    .model
                    .read()
                    .sources()
                    .filter(|source| !context.vault.contains_document(source))
                    .cloned()
                    .collect();
                for source in stale {
                    let removed = self.model.write().remove(&source);
                    emit(removed, Vec::new(), output);
                }
            }
            (_, Payload::Folder(folder)) => {
                for document in context.vault.documents_in(folder, true) {
                    self.index(document, output);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::changelog::Changelog;
    use crate::front_matter::FrontMatterCollector;
    use crate::parallel::PassContext;
    use crate::vault::Vault;

    fn vault() -> Vault {
        let mut vault = Vault::new("test");
        vault.insert_document(Document::parse("A", "", 0, "[[B]] and [[C]]\n"));
        vault.insert_document(Document::parse("B", "sub", 0, "[[C]]\n"));
        vault.insert_document(Document::parse("C", "", 0, "nothing\n"));
        vault
    }

    fn run(stage: &mut LinksStage, vault: &Vault, change: Change) -> Changelog {
        let front_matter = FrontMatterCollector::new();
        let pass = PassContext::new(Arc::from("test"), 1);
        let context = StageContext::new(vault, &front_matter, &pass);
        stage.run(&Changelog::of(change), &context).unwrap()
    }

    #[test]
    fn test_full_refresh_builds_backlinks() {
        let model = Arc::new(RwLock::new(LinksModel::new()));
        let mut stage = LinksStage::new(model.clone());

        let output = run(&mut stage, &vault(), Change::create(Payload::Vault));

        assert_eq!(output.len(), 3);
        assert!(output.changes().all(|c| c.kind() == ChangeKind::Create));
        let model = model.read();
        assert_eq!(
            model.backlinks("C"),
            vec![Arc::<str>::from("A"), Arc::<str>::from("B")]
        );
        assert_eq!(model.backlink_count("B"), 1);
        assert_eq!(model.backlink_count("A"), 0);
    }

    #[test]
    fn test_document_update_emits_link_diff() {
        let model = Arc::new(RwLock::new(LinksModel::new()));
        let mut stage = LinksStage::new(model.clone());
        let mut vault = vault();
        run(&mut stage, &vault, Change::create(Payload::Vault));

        let old = vault.document("A").unwrap().clone();
        vault.insert_document(Document::parse("A", "", 1, "[[C]] and [[D]]\n"));
        let new = vault.document("A").unwrap().clone();

        let output = run(
            &mut stage,
            &vault,
            Change::update(Payload::Document(old), Payload::Document(new)),
        );

        let summary: Vec<(ChangeKind, String)> = output
            .changes()
            .map(|c| (c.kind(), c.value().as_link().unwrap().target.to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChangeKind::Delete, "B".to_string()),
                (ChangeKind::Create, "D".to_string())
            ]
        );
        assert_eq!(model.read().backlink_count("B"), 0);
    }

    #[test]
    fn test_folder_delete_drops_links_of_removed_documents() {
        let model = Arc::new(RwLock::new(LinksModel::new()));
        let mut stage = LinksStage::new(model.clone());
        let mut vault = vault();
        run(&mut stage, &vault, Change::create(Payload::Vault));

        vault.remove_folder("sub");
        let output = run(
            &mut stage,
            &vault,
            Change::delete(Payload::Folder(Arc::from("sub"))),
        );

        assert_eq!(output.len(), 1);
        assert_eq!(model.read().backlinks("C"), vec![Arc::<str>::from("A")]);
    }
}
