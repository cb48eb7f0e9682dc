//! The curator: one vault, its stages and queries, driven one change at a time.

use crate::change::{Change, Payload, PayloadSet, PayloadType};
use crate::config::CuratorConfig;
use crate::error::{CuratorError, Result};
use crate::front_matter::FrontMatterCollector;
use crate::orchestrator::StageOrchestrator;
use crate::parallel::PassContext;
use crate::pipeline::{Stage, StageContext};
use crate::query::builtin::{
    BacklinksQuery, DeadLinksQuery, ListQuery, TableOfContentsQuery, TableQuery,
};
use crate::query::{Query, QueryCatalog, QueryEvaluator};
use crate::rewrite::{select_updates, CommitReport, DocumentCommitter};
use crate::stages::{BacklinkCountStage, LinksModel, LinksStage};
use crate::vault::{DocumentStore, FileSystemVault, Vault};
use crate::watcher::{FileChangeEvent, FileEventHandler, FileWatcher, WatchConfig};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Summary of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pass: u64,
    /// Changes in the pass's changelog, the triggering change included.
    pub changes: usize,
    /// Query sites evaluated successfully.
    pub evaluated: usize,
    /// Evaluated sites whose output differs from the stored one.
    pub changed: usize,
    pub commit: CommitReport,
}

impl PassReport {
    pub fn written(&self) -> Vec<&str> {
        self.commit
            .written
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

pub struct Curator {
    name: Arc<str>,
    vault: Vault,
    source: Arc<FileSystemVault>,
    orchestrator: StageOrchestrator,
    catalog: QueryCatalog,
    evaluator: QueryEvaluator,
    committer: DocumentCommitter,
    front_matter: FrontMatterCollector,
    watch_document: Option<String>,
    watch_config: WatchConfig,
    /// Documents written by this curator whose change notification is pending.
    self_written: HashSet<String>,
    passes: u64,
}

impl Curator {
    pub fn builder(config: CuratorConfig) -> CuratorBuilder {
        CuratorBuilder::new(config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    pub fn execution_plan(&self) -> String {
        self.orchestrator.execution_plan()
    }

    /// A full pass over the whole vault.
    pub fn run_once(&mut self) -> PassReport {
        self.run_pass(Change::create(Payload::Vault))
    }

    /// Runs a full pass, then keeps processing file-system changes until the
    /// watcher stops.
    pub fn run_daemon(mut self) -> Result<()> {
        self.run_once();
        let watch_config = self.watch_config.clone();
        let name = self.name.clone();
        let handler: Arc<Mutex<dyn FileEventHandler>> = Arc::new(Mutex::new(self));

        let mut watcher = FileWatcher::new(watch_config, handler)?;
        watcher.start()?;
        info!("Curator '{}' is watching for changes", name);
        watcher.wait()
    }

    /// Applies a file-system event to the vault and runs a pass for the
    /// resulting change, if any.
    pub fn on_file_event(&mut self, event: &FileChangeEvent) -> Option<PassReport> {
        let Some(change) = self.source.apply(&mut self.vault, event) else {
            debug!("Ignoring {} event for {}", event.event_type(), event.path().display());
            return None;
        };
        self.handle(change)
    }

    /// Runs a pass for `change`, unless it is the echo of this curator's own
    /// write.
    pub fn handle(&mut self, change: Change) -> Option<PassReport> {
        if self.is_self_triggered(&change) {
            return None;
        }
        let change = self.promote_watch_document(change);
        Some(self.run_pass(change))
    }

    /// The first update of a document after this curator wrote it is the
    /// echo of that write. Any other change to the document means the echo
    /// will not come.
    fn is_self_triggered(&mut self, change: &Change) -> bool {
        let Payload::Document(document) = change.value() else {
            return false;
        };
        let written = self.self_written.remove(document.name());
        let swallowed = written && matches!(change, Change::Update { .. });
        if swallowed {
            debug!("Ignoring own update of document '{}'", document.name());
        }
        swallowed
    }

    /// A change to the watch document refreshes everything.
    fn promote_watch_document(&self, change: Change) -> Change {
        let Some(watched) = &self.watch_document else {
            return change;
        };
        let touches_watched = !matches!(change, Change::Delete(_))
            && change.payload_type() == PayloadType::Document
            && change
                .value()
                .as_document()
                .is_some_and(|document| document.name() == watched);
        if touches_watched {
            info!("Watch document '{}' changed; refreshing everything", watched);
            Change::touch(Payload::Vault)
        } else {
            change
        }
    }

    fn run_pass(&mut self, change: Change) -> PassReport {
        self.passes += 1;
        let context = PassContext::new(self.name.clone(), self.passes);
        let span = context.span();
        let _entered = span.enter();
        let started = Instant::now();
        debug!("Starting pass for {} {}", change.kind(), change.payload_type());

        let stage_context = StageContext::new(&self.vault, &self.front_matter, &context);
        let changelog = self.orchestrator.run_for(change, &stage_context);
        let front_matter = self.front_matter.take();
        let extra_documents: BTreeSet<String> = front_matter.keys().cloned().collect();

        let outputs = self.evaluator.run_for(
            &changelog,
            &self.vault,
            &self.catalog,
            &extra_documents,
            &context,
        );
        let evaluated = outputs.len();
        let changed = outputs.iter().filter(|output| output.changed).count();

        let updates = select_updates(outputs, &front_matter, &self.vault);
        let commit = self.committer.commit(&updates);
        for (name, _) in &commit.written {
            self.self_written.insert(name.clone());
            self.reload(name);
        }

        info!(
            "Pass {} done in {} ms: {} changes, {} queries ({} changed), {} documents written",
            self.passes,
            started.elapsed().as_millis(),
            changelog.len(),
            evaluated,
            changed,
            commit.written.len()
        );
        PassReport {
            pass: self.passes,
            changes: changelog.len(),
            evaluated,
            changed,
            commit,
        }
    }

    /// Brings a document this curator just wrote back in sync with the disk.
    fn reload(&mut self, name: &str) {
        let Some(document) = self.vault.document(name) else {
            return;
        };
        let path = self.source.resolve_path(document);
        if self
            .source
            .apply(&mut self.vault, &FileChangeEvent::Modified(path))
            .is_none()
        {
            debug!("Could not reload document '{}' after writing it", name);
        }
    }
}

impl FileEventHandler for Curator {
    fn handle_event(&mut self, event: FileChangeEvent) -> Result<()> {
        self.on_file_event(&event);
        Ok(())
    }

    fn handle_error(&mut self, error: CuratorError) {
        error!("Curator '{}' watcher error: {}", self.name, error);
    }
}

/// Assembles a [`Curator`] from configuration plus custom stages and queries.
///
/// The built-in links stage and the `toc`, `list`, `backlinks` and
/// `deadlinks` queries are always present; the backlink count stage is added
/// when `backlink_count_key` is configured.
pub struct CuratorBuilder {
    config: CuratorConfig,
    stages: Vec<Box<dyn Stage>>,
    queries: Vec<Arc<dyn Query>>,
    external: PayloadSet,
    links: Arc<RwLock<LinksModel>>,
}

impl CuratorBuilder {
    pub fn new(config: CuratorConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
            queries: Vec::new(),
            external: PayloadSet::empty(),
            links: Arc::new(RwLock::new(LinksModel::new())),
        }
    }

    /// The link graph maintained by the built-in links stage, for custom
    /// stages and queries that need it.
    pub fn links(&self) -> Arc<RwLock<LinksModel>> {
        self.links.clone()
    }

    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Adds a query. Custom queries take precedence over built-in ones of
    /// the same name.
    pub fn query<Q: Query + 'static>(mut self, query: Q) -> Self {
        self.queries.push(Arc::new(query));
        self
    }

    /// Declares a payload type that no stage produces but that is fed in
    /// from outside.
    pub fn external_type(mut self, payload_type: PayloadType) -> Self {
        self.external = self.external.with(payload_type);
        self
    }

    pub fn build(self) -> Result<Curator> {
        self.config.validate()?;
        let source = Arc::new(FileSystemVault::new(self.config.vault_root()?)?);
        let vault = source.load()?;
        let name: Arc<str> = Arc::from(self.config.name.clone().unwrap_or_else(|| source.name()));

        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(LinksStage::new(self.links.clone()))];
        if let Some(key) = &self.config.backlink_count_key {
            stages.push(Box::new(BacklinkCountStage::new(key.clone(), self.links.clone())));
        }
        stages.extend(self.stages);
        let orchestrator = StageOrchestrator::new(stages, self.external)?;

        let mut catalog = QueryCatalog::new();
        for query in self.queries {
            catalog.register(query);
        }
        catalog.register(Arc::new(TableOfContentsQuery));
        catalog.register(Arc::new(ListQuery));
        catalog.register(Arc::new(TableQuery));
        catalog.register(Arc::new(BacklinksQuery::new(self.links.clone())));
        catalog.register(Arc::new(DeadLinksQuery::new(self.links.clone())));

        let evaluator = QueryEvaluator::new(self.config.worker_threads)?;
        let store: Arc<dyn DocumentStore> = source.clone();
        let committer = DocumentCommitter::new(store, self.config.cool_off());
        let watch_config = self.config.watch_config(source.root());

        info!(
            "Curator '{}' on {}: stages {}, {} queries, {} workers",
            name,
            source.root().display(),
            orchestrator.execution_plan(),
            catalog.len(),
            evaluator.worker_threads()
        );

        Ok(Curator {
            name,
            vault,
            source,
            orchestrator,
            catalog,
            evaluator,
            committer,
            front_matter: FrontMatterCollector::new(),
            watch_document: self.config.watch_document.clone(),
            watch_config,
            self_written: HashSet::new(),
            passes: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CuratorConfig {
        CuratorConfig {
            cool_off_ms: 0,
            worker_threads: 2,
            ..CuratorConfig::for_vault(dir.path())
        }
    }

    #[test]
    fn test_build_requires_vault() {
        assert!(matches!(
            Curator::builder(CuratorConfig::default()).build(),
            Err(CuratorError::Config(_))
        ));
    }

    #[test]
    fn test_builtin_plan() {
        let dir = TempDir::new().unwrap();
        let curator = Curator::builder(CuratorConfig {
            backlink_count_key: Some("backlinks".to_string()),
            ..config(&dir)
        })
        .build()
        .unwrap();
        assert_eq!(curator.execution_plan(), "links → backlink-count");
        assert_eq!(curator.name(), dir.path().file_name().unwrap().to_str().unwrap());
    }

    #[test]
    fn test_own_write_is_swallowed_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.md"), "<!--query:list-->\n<!--/query-->\n").unwrap();
        fs::write(dir.path().join("other.md"), "\n").unwrap();
        let mut curator = Curator::builder(config(&dir)).build().unwrap();

        let report = curator.run_once();
        assert_eq!(report.written(), vec!["doc"]);

        let path = curator.source.root().join("doc.md");
        assert!(curator
            .on_file_event(&FileChangeEvent::Modified(path.clone()))
            .is_none());
        assert!(curator
            .on_file_event(&FileChangeEvent::Modified(path))
            .is_some());
    }

    #[test]
    fn test_watch_document_change_becomes_vault_refresh() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Curator.md"), "settings\n").unwrap();
        let mut curator = Curator::builder(CuratorConfig {
            watch_document: Some("Curator".to_string()),
            ..config(&dir)
        })
        .build()
        .unwrap();
        let document = curator.vault().document("Curator").unwrap().clone();

        let promoted = curator.promote_watch_document(Change::touch(Payload::Document(document.clone())));
        assert_eq!(promoted, Change::touch(Payload::Vault));
        let deleted = Change::delete(Payload::Document(document));
        assert_eq!(curator.promote_watch_document(deleted.clone()), deleted);
    }
}
