//! Queries: named report generators whose output is embedded in documents.
//!
//! A [`QuerySite`] is one query block in one document. During a pass the
//! [`QueryEvaluator`] runs the query behind every relevant site, and the
//! rewrite step writes back the outputs whose hash changed.

mod catalog;
mod evaluator;
pub mod builtin;
pub mod result;

pub use catalog::QueryCatalog;
pub use evaluator::{QueryEvaluator, QueryOutput};

use crate::changelog::Changelog;
use crate::vault::{Dictionary, Document, FragmentId, QueryBlock, Vault};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid value for '{key}': {message}")]
    InvalidConfiguration { key: String, message: String },

    #[error("{0}")]
    Failed(String),
}

impl QueryError {
    pub fn invalid<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::InvalidConfiguration {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Stable identity of a query site within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteId {
    pub document: Arc<str>,
    pub fragment: FragmentId,
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.fragment.index())
    }
}

/// A query block in a specific document.
#[derive(Debug, Clone)]
pub struct QuerySite {
    document: Arc<Document>,
    fragment: FragmentId,
    block: QueryBlock,
}

impl QuerySite {
    /// `None` when `fragment` is not a query block of `document`.
    pub fn new(document: Arc<Document>, fragment: FragmentId) -> Option<Self> {
        let block = document.query_block(fragment)?.clone();
        Some(Self {
            document,
            fragment,
            block,
        })
    }

    pub fn id(&self) -> SiteId {
        SiteId {
            document: self.document.name_arc().clone(),
            fragment: self.fragment,
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn fragment(&self) -> FragmentId {
        self.fragment
    }

    pub fn query_name(&self) -> &str {
        &self.block.name
    }

    pub fn configuration(&self) -> &Dictionary {
        &self.block.configuration
    }

    pub fn stored_hash(&self) -> Option<&str> {
        self.block.hash.as_deref()
    }
}

/// Everything a query may look at while it runs.
pub struct QueryDefinition<'a> {
    pub site: &'a QuerySite,
    pub vault: &'a Vault,
    pub catalog: &'a QueryCatalog,
}

impl<'a> QueryDefinition<'a> {
    pub fn new(site: &'a QuerySite, vault: &'a Vault, catalog: &'a QueryCatalog) -> Self {
        Self {
            site,
            vault,
            catalog,
        }
    }

    pub fn document(&self) -> &'a Document {
        self.site.document()
    }

    pub fn configuration(&self) -> &'a Dictionary {
        self.site.configuration()
    }
}

/// A report generator.
///
/// Implementations must be safe to run concurrently: during evaluation the
/// same query runs for many sites at once, each on its own worker thread.
pub trait Query: Send + Sync {
    /// Lower-case name used in `<!--query:name-->`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Configuration keys and what they do, for the help query.
    fn supported_configuration(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::new()
    }

    /// Whether the output at `site` may differ after `changelog`. Sites that
    /// have never been written are always evaluated.
    fn is_impacted_by(&self, _changelog: &Changelog, _site: &QuerySite) -> bool {
        true
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError>;
}
