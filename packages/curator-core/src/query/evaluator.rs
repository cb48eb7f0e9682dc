use super::{QueryCatalog, QueryDefinition, QuerySite};
use crate::change::PayloadType;
use crate::changelog::Changelog;
use crate::error::{CuratorError, Result};
use crate::hash::short_hash;
use crate::parallel::{build_pool, run_in_parallel, PassContext};
use crate::vault::Vault;
use rayon::ThreadPool;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Evaluated output for one query site.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub site: QuerySite,
    /// Trimmed query output.
    pub content: String,
    pub hash: String,
    /// Whether `hash` differs from the hash stored in the document.
    pub changed: bool,
}

impl QueryOutput {
    pub fn new(site: QuerySite, output: &str) -> Self {
        let content = output.trim().to_string();
        let hash = short_hash(&content);
        let changed = site.stored_hash() != Some(hash.as_str());
        Self {
            site,
            content,
            hash,
            changed,
        }
    }
}

/// Runs queries on a dedicated worker pool.
pub struct QueryEvaluator {
    pool: ThreadPool,
}

impl QueryEvaluator {
    pub fn new(worker_threads: usize) -> Result<Self> {
        let pool = build_pool(worker_threads)
            .map_err(|e| CuratorError::WorkerPool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluates every query in the documents affected by `changelog`, plus
    /// the documents in `extra_documents`, and waits for all of them.
    ///
    /// Failed sites are logged and left out of the result.
    pub fn run_for(
        &self,
        changelog: &Changelog,
        vault: &Vault,
        catalog: &QueryCatalog,
        extra_documents: &BTreeSet<String>,
        context: &PassContext,
    ) -> Vec<QueryOutput> {
        let sites = self.select_sites(changelog, vault, catalog, extra_documents);
        if sites.is_empty() {
            debug!("No queries to run");
            return Vec::new();
        }

        let run = run_in_parallel(
            &self.pool,
            context,
            &sites,
            |site| format!("query '{}' at {}", site.query_name(), site.id()),
            |site| {
                let query = catalog.query(site.query_name());
                query
                    .run(&QueryDefinition::new(site, vault, catalog))
                    .map(|output| QueryOutput::new(site.clone(), &output))
            },
        );

        let outputs: Vec<QueryOutput> = run.results.into_iter().flatten().collect();
        info!(
            "Ran {} queries in {} ms ({} changed, {} failed)",
            sites.len(),
            run.duration.as_millis(),
            outputs.iter().filter(|o| o.changed).count(),
            sites.len() - outputs.len()
        );
        outputs
    }

    /// All sites of the documents that need evaluating, in vault order.
    ///
    /// A vault change selects everything. Otherwise a document is selected
    /// when one of its sites was never written, when one of its queries
    /// reports being impacted, or when it is in `extra_documents`.
    fn select_sites(
        &self,
        changelog: &Changelog,
        vault: &Vault,
        catalog: &QueryCatalog,
        extra_documents: &BTreeSet<String>,
    ) -> Vec<QuerySite> {
        let sites = vault.query_sites();
        if changelog.contains(PayloadType::Vault) {
            return sites;
        }

        let impacted: HashSet<Arc<str>> = self.pool.install(|| {
            use rayon::prelude::*;
            sites
                .par_iter()
                .filter(|site| {
                    site.stored_hash().is_none()
                        || extra_documents.contains(site.document().name())
                        || catalog
                            .query(site.query_name())
                            .is_impacted_by(changelog, site)
                })
                .map(|site| site.document().name_arc().clone())
                .collect()
        });

        sites
            .into_iter()
            .filter(|site| impacted.contains(site.document().name()))
            .collect()
    }
}
