//! Writes the number of backlinks of a document into its front matter.

use super::LinksModel;
use crate::change::{Attribute, Change, Payload, PayloadSet, PayloadType};
use crate::changelog::{ChangeCollector, Changelog};
use crate::error::Result;
use crate::pipeline::{Stage, StageContext};
use parking_lot::RwLock;
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct BacklinkCountStage {
    key: String,
    links: Arc<RwLock<LinksModel>>,
}

impl BacklinkCountStage {
    pub fn new<S: Into<String>>(key: S, links: Arc<RwLock<LinksModel>>) -> Self {
        Self {
            key: key.into(),
            links,
        }
    }

    /// Queues a front-matter update for `target` when its stored count is stale.
    fn update(&self, target: &str, context: &StageContext<'_>, output: &mut ChangeCollector) {
        let Some(document) = context.vault.document(target) else {
            return;
        };
        let count = self.links.read().backlink_count(target) as i64;
        if document.front_matter().integer(&self.key) == Some(count) {
            return;
        }
        context.front_matter.set(target, &self.key, count);
        output.touch(Payload::Attribute(Attribute {
            document: document.name_arc().clone(),
            key: self.key.clone(),
            value: Value::from(count),
        }));
    }
}

impl Stage for BacklinkCountStage {
    fn name(&self) -> &str {
        "backlink-count"
    }

    fn consumes(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Link])
    }

    fn produces(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Attribute])
    }

    fn refresh(&mut self, context: &StageContext<'_>, output: &mut ChangeCollector) -> Result<()> {
        for document in context.vault.documents() {
            self.update(document.name(), context, output);
        }
        Ok(())
    }

    fn apply(
        &mut self,
        change: &Change,
        context: &StageContext<'_>,
        output: &mut ChangeCollector,
    ) -> Result<()> {
        if let Some(link) = change.value().as_link() {
            self.update(&link.target, context, output);
        }
        Ok(())
    }

    /// Updates each affected target once, however many of its links changed.
    fn run(&mut self, changelog: &Changelog, context: &StageContext<'_>) -> Result<Changelog> {
        let mut output = ChangeCollector::new();
        if self.requires_full_refresh(changelog) {
            self.refresh(context, &mut output)?;
            return Ok(output.into_changelog());
        }
        let targets: BTreeSet<Arc<str>> = changelog
            .changes_of(PayloadType::Link)
            .filter_map(|change| change.value().as_link())
            .map(|link| link.target.clone())
            .collect();
        for target in targets {
            self.update(&target, context, &mut output);
        }
        Ok(output.into_changelog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front_matter::FrontMatterCollector;
    use crate::parallel::PassContext;
    use crate::stages::LinksStage;
    use crate::vault::{Document, Vault};

    #[test]
    fn test_counts_are_written_once_per_target() {
        let mut vault = Vault::new("test");
        vault.insert_document(Document::parse("A", "", 0, "[[C]]\n"));
        vault.insert_document(Document::parse("B", "", 0, "[[C]] [[C#x]]\n"));
        vault.insert_document(Document::parse("C", "", 0, "---\nbacklinks: 1\n---\n"));
        vault.insert_document(Document::parse("D", "", 0, "[[Missing]]\n"));

        let links = Arc::new(RwLock::new(LinksModel::new()));
        let front_matter = FrontMatterCollector::new();
        let pass = PassContext::new(Arc::from("test"), 1);
        let context = StageContext::new(&vault, &front_matter, &pass);

        let link_changes = LinksStage::new(links.clone())
            .run(&Changelog::of(Change::create(Payload::Vault)), &context)
            .unwrap();
        let mut stage = BacklinkCountStage::new("backlinks", links);
        let output = stage.run(&link_changes, &context).unwrap();

        assert_eq!(output.len(), 1);
        let updates = front_matter.take();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates["C"].integer("backlinks"), Some(2));
    }

    #[test]
    fn test_up_to_date_count_is_left_alone() {
        let mut vault = Vault::new("test");
        vault.insert_document(Document::parse("A", "", 0, "[[C]]\n"));
        vault.insert_document(Document::parse("C", "", 0, "---\nbacklinks: 1\n---\n"));

        let links = Arc::new(RwLock::new(LinksModel::new()));
        let front_matter = FrontMatterCollector::new();
        let pass = PassContext::new(Arc::from("test"), 1);
        let context = StageContext::new(&vault, &front_matter, &pass);

        let link_changes = LinksStage::new(links.clone())
            .run(&Changelog::of(Change::create(Payload::Vault)), &context)
            .unwrap();
        let output = BacklinkCountStage::new("backlinks", links)
            .run(&link_changes, &context)
            .unwrap();

        assert!(output.is_empty());
        assert!(front_matter.is_empty());
    }
}
