/*
 * Curator Core - Change propagation for Markdown vaults
 *
 * Keeps generated regions ("query blocks") in a folder of Markdown documents
 * up to date as the documents change.
 *
 * Architecture:
 * - Change / Changelog: typed, immutable events
 * - Stages: stateful steps ordered by the payload types they consume and produce
 * - Queries: evaluated concurrently on a worker pool, gated by content hashes
 * - Rewrite: byte-exact reconstruction, modification-time checked writes
 * - Curator: one pass per change, run once or as a watching daemon
 */

pub mod change;
pub mod changelog;
pub mod config;
pub mod curator;
pub mod dag;
pub mod error;
pub mod front_matter;
pub mod hash;
pub mod orchestrator;
pub mod parallel;
pub mod pipeline;
pub mod query;
pub mod rewrite;
pub mod stages;
pub mod vault;
pub mod watcher;

// Re-exports
pub use change::{Attribute, Change, ChangeKind, Payload, PayloadSet, PayloadType};
pub use changelog::{ChangeCollector, Changelog};
pub use config::{ConfigError, CuratorConfig};
pub use curator::{Curator, CuratorBuilder, PassReport};
pub use dag::{execution_order, StageNode};
pub use error::{ChangeError, ConfigurationError, CuratorError, Result};
pub use front_matter::FrontMatterCollector;
pub use orchestrator::StageOrchestrator;
pub use parallel::PassContext;
pub use pipeline::{Stage, StageContext};
pub use query::{Query, QueryCatalog, QueryDefinition, QueryError, QuerySite};
pub use rewrite::{CommitReport, DocumentUpdate};
pub use vault::{Dictionary, Document, DocumentStore, FileSystemVault, InternalLink, Vault};
