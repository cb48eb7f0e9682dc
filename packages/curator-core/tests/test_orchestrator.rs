//! Stage ordering and change propagation through the public API.

use curator_core::stages::{LinksModel, LinksStage};
use curator_core::{
    Attribute, Change, ChangeCollector, ConfigurationError, Curator, CuratorConfig, CuratorError,
    Document, FrontMatterCollector, PassContext, Payload, PayloadSet, PayloadType, Stage,
    StageContext, StageOrchestrator, Vault,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tempfile::TempDir;

/// Turns every link change into an attribute on the link's source.
struct LinkTagger;

impl Stage for LinkTagger {
    fn name(&self) -> &str {
        "link-tagger"
    }

    fn consumes(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Link])
    }

    fn produces(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Attribute])
    }

    fn refresh(
        &mut self,
        _context: &StageContext<'_>,
        _output: &mut ChangeCollector,
    ) -> curator_core::Result<()> {
        Ok(())
    }

    fn apply(
        &mut self,
        change: &Change,
        _context: &StageContext<'_>,
        output: &mut ChangeCollector,
    ) -> curator_core::Result<()> {
        if let Payload::Link(link) = change.value() {
            output.touch(Payload::Attribute(Attribute {
                document: link.source.clone(),
                key: "links-to".to_string(),
                value: serde_yaml::Value::from(link.target.to_string()),
            }));
        }
        Ok(())
    }
}

/// Consumes attributes and produces links, closing a loop with [`LinkTagger`].
struct AttributeLinker;

impl Stage for AttributeLinker {
    fn name(&self) -> &str {
        "attribute-linker"
    }

    fn consumes(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Attribute])
    }

    fn produces(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Link])
    }

    fn refresh(
        &mut self,
        _context: &StageContext<'_>,
        _output: &mut ChangeCollector,
    ) -> curator_core::Result<()> {
        Ok(())
    }

    fn apply(
        &mut self,
        _change: &Change,
        _context: &StageContext<'_>,
        _output: &mut ChangeCollector,
    ) -> curator_core::Result<()> {
        Ok(())
    }
}

/// Claims to produce documents, which only the vault may do.
struct DocumentForger;

impl Stage for DocumentForger {
    fn name(&self) -> &str {
        "forger"
    }

    fn consumes(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Folder])
    }

    fn produces(&self) -> PayloadSet {
        PayloadSet::of(&[PayloadType::Document])
    }

    fn refresh(
        &mut self,
        _context: &StageContext<'_>,
        _output: &mut ChangeCollector,
    ) -> curator_core::Result<()> {
        Ok(())
    }

    fn apply(
        &mut self,
        _change: &Change,
        _context: &StageContext<'_>,
        _output: &mut ChangeCollector,
    ) -> curator_core::Result<()> {
        Ok(())
    }
}

#[test]
fn test_document_change_propagates_through_ordered_stages() {
    let links = Arc::new(RwLock::new(LinksModel::new()));
    let mut orchestrator = StageOrchestrator::new(
        vec![Box::new(LinkTagger), Box::new(LinksStage::new(links.clone()))],
        PayloadSet::empty(),
    )
    .unwrap();
    assert_eq!(orchestrator.stage_names(), vec!["links", "link-tagger"]);

    let mut vault = Vault::new("test");
    vault.insert_document(Document::parse("a", "", 0, "[[b]] and [[c]]\n"));
    let document = vault.document("a").unwrap().clone();

    let front_matter = FrontMatterCollector::new();
    let pass = PassContext::new(Arc::from("test"), 1);
    let context = StageContext::new(&vault, &front_matter, &pass);
    let changelog = orchestrator.run_for(Change::create(Payload::Document(document)), &context);

    let types: Vec<PayloadType> = changelog.changes().map(Change::payload_type).collect();
    assert_eq!(
        types,
        vec![
            PayloadType::Document,
            PayloadType::Link,
            PayloadType::Link,
            PayloadType::Attribute,
            PayloadType::Attribute,
        ]
    );
    assert_eq!(links.read().backlink_count("b"), 1);
}

#[test]
fn test_cyclic_stages_fail_at_startup() {
    let dir = TempDir::new().unwrap();
    let result = Curator::builder(CuratorConfig::for_vault(dir.path()))
        .stage(LinkTagger)
        .stage(AttributeLinker)
        .build();

    match result {
        Err(CuratorError::Configuration(ConfigurationError::DependencyCycle { stages })) => {
            assert_eq!(stages, vec!["attribute-linker", "link-tagger"]);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("cyclic stages were accepted"),
    }
}

#[test]
fn test_reserved_production_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let result = Curator::builder(CuratorConfig::for_vault(dir.path()))
        .stage(DocumentForger)
        .build();
    assert!(matches!(
        result,
        Err(CuratorError::Configuration(
            ConfigurationError::ReservedTypeProduced { .. }
        ))
    ));
}

#[test]
fn test_custom_stage_joins_the_builtin_plan() {
    let dir = TempDir::new().unwrap();
    let curator = Curator::builder(CuratorConfig::for_vault(dir.path()))
        .stage(LinkTagger)
        .build()
        .unwrap();
    assert_eq!(curator.execution_plan(), "links → link-tagger");
}
