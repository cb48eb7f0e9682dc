//! Turning evaluated query output and queued front-matter updates back into
//! documents on disk.

mod commit;
mod writer;

pub use commit::{CommitReport, DocumentCommitter};
pub use writer::rewrite_document;

use crate::query::QueryOutput;
use crate::vault::{Dictionary, Document, FragmentId, Vault};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Everything that changes in one document during a pass.
#[derive(Debug, Clone)]
pub struct DocumentUpdate {
    /// The document as it was loaded; its modification time guards the write.
    pub document: Arc<Document>,
    /// Front matter to write, already merged with the existing one.
    pub front_matter: Option<Dictionary>,
    /// New output per query block, including unchanged ones.
    pub outputs: BTreeMap<FragmentId, QueryOutput>,
}

impl DocumentUpdate {
    pub fn name(&self) -> &str {
        self.document.name()
    }
}

/// Groups query outputs and front-matter updates by document and keeps the
/// documents that actually need rewriting, sorted by name.
///
/// A document qualifies when one of its query outputs changed, or when merging
/// the queued front-matter updates alters its front matter.
pub fn select_updates(
    outputs: Vec<QueryOutput>,
    front_matter: &BTreeMap<String, Dictionary>,
    vault: &Vault,
) -> Vec<DocumentUpdate> {
    let mut by_document: BTreeMap<String, BTreeMap<FragmentId, QueryOutput>> = BTreeMap::new();
    for output in outputs {
        by_document
            .entry(output.site.document().name().to_string())
            .or_default()
            .insert(output.site.fragment(), output);
    }
    for name in front_matter.keys() {
        by_document.entry(name.clone()).or_default();
    }

    let mut updates = Vec::new();
    for (name, outputs) in by_document {
        let Some(document) = vault.document(&name) else {
            debug!("Document '{}' is no longer in the vault, not rewriting it", name);
            continue;
        };
        let merged = front_matter
            .get(&name)
            .map(|pending| document.front_matter().merged_with(pending))
            .filter(|merged| merged != document.front_matter());
        let outputs_changed = outputs.values().any(|output| output.changed);
        if !outputs_changed && merged.is_none() {
            continue;
        }
        updates.push(DocumentUpdate {
            document: document.clone(),
            front_matter: merged,
            outputs,
        });
    }
    updates
}
