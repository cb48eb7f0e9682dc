//! In-memory model of a vault: a tree of folders holding Markdown documents.
//!
//! The model is rebuilt from disk at startup by [`FileSystemVault::load`] and
//! kept current by applying file-system events, each of which yields at most
//! one [`Change`](crate::change::Change).

mod dictionary;
mod document;
mod links;
mod parser;
mod store;

pub use dictionary::Dictionary;
pub use document::{
    anchor_for, Document, Fragment, FragmentId, FragmentKind, QueryBlock, Section,
};
pub use links::{find_links, InternalLink};
pub use store::{DocumentStore, FileSystemVault};

pub(crate) use parser::{COMMENT_END, FRONT_MATTER_MARKER, QUERY_END};

use crate::query::QuerySite;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// Documents are identified by name, which is unique across the vault.
#[derive(Debug, Clone, Default)]
pub struct Vault {
    name: String,
    folders: BTreeSet<Arc<str>>,
    documents: BTreeMap<Arc<str>, Arc<Document>>,
}

impl Vault {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let mut folders = BTreeSet::new();
        folders.insert(Arc::from(""));
        Self {
            name: name.into(),
            folders,
            documents: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.values()
    }

    pub fn document(&self, name: &str) -> Option<&Arc<Document>> {
        self.documents.get(name)
    }

    pub fn contains_document(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.folders.iter().map(|f| &**f)
    }

    pub fn has_folder(&self, folder: &str) -> bool {
        self.folders.contains(folder)
    }

    /// Documents directly in `folder`, or anywhere below it when `recurse` is set.
    pub fn documents_in<'a>(
        &'a self,
        folder: &'a str,
        recurse: bool,
    ) -> impl Iterator<Item = &'a Arc<Document>> + 'a {
        self.documents.values().filter(move |d| {
            if recurse {
                is_within(d.folder(), folder)
            } else {
                d.folder() == folder
            }
        })
    }

    /// Every query block in the vault, grouped by document in name order.
    pub fn query_sites(&self) -> Vec<QuerySite> {
        self.documents
            .values()
            .flat_map(|document| {
                document
                    .query_blocks()
                    .filter_map(|(id, _)| QuerySite::new(document.clone(), id))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Inserts a folder and all of its ancestors. Returns whether it was new.
    pub fn insert_folder(&mut self, folder: &str) -> bool {
        let mut inserted = false;
        let mut prefix = String::new();
        for part in folder.split('/').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            inserted = self.folders.insert(Arc::from(prefix.as_str()));
        }
        inserted
    }

    /// Removes a folder, its subfolders and every document below it.
    pub fn remove_folder(&mut self, folder: &str) -> Vec<Arc<Document>> {
        if folder.is_empty() || !self.folders.contains(folder) {
            return Vec::new();
        }
        self.folders.retain(|f| !is_within(f, folder));
        let names: Vec<Arc<str>> = self
            .documents
            .iter()
            .filter(|(_, d)| is_within(d.folder(), folder))
            .map(|(name, _)| name.clone())
            .collect();
        names
            .iter()
            .filter_map(|name| self.documents.remove(name))
            .collect()
    }

    /// Adds or replaces a document, returning the one it replaced.
    pub fn insert_document(&mut self, document: Document) -> Option<Arc<Document>> {
        self.insert_folder(document.folder());
        let name = document.name_arc().clone();
        let previous = self.documents.insert(name, Arc::new(document));
        if let Some(previous) = &previous {
            let current = &self.documents[previous.name()];
            if previous.folder() != current.folder() {
                warn!(
                    "Document name '{}' exists in both '{}' and '{}'; keeping the latter",
                    previous.name(),
                    previous.folder(),
                    current.folder()
                );
            }
        }
        previous
    }

    pub fn remove_document(&mut self, name: &str) -> Option<Arc<Document>> {
        self.documents.remove(name)
    }
}

/// Whether `folder` is `parent` or lies below it. The root contains everything.
pub fn is_within(folder: &str, parent: &str) -> bool {
    parent.is_empty()
        || folder == parent
        || (folder.starts_with(parent) && folder[parent.len()..].starts_with('/'))
}
