use super::{rewrite_document, DocumentUpdate};
use crate::vault::DocumentStore;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to the documents handed to [`DocumentCommitter::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Written documents with their new modification time.
    pub written: Vec<(String, u64)>,
    /// Documents left alone: changed on disk meanwhile, or nothing to write.
    pub skipped: Vec<String>,
    /// Documents whose rewrite or write failed.
    pub failed: Vec<String>,
}

/// Writes rewritten documents back to their store.
pub struct DocumentCommitter {
    store: Arc<dyn DocumentStore>,
    cool_off: Duration,
}

impl DocumentCommitter {
    pub fn new(store: Arc<dyn DocumentStore>, cool_off: Duration) -> Self {
        Self { store, cool_off }
    }

    /// Writes every update whose document did not change on disk since it was
    /// loaded.
    ///
    /// Waits for the cool-off first, giving an editor that is still saving the
    /// chance to finish; the modification time check then catches what the
    /// wait did not. Nothing here is fatal: failures are logged and reported.
    pub fn commit(&self, updates: &[DocumentUpdate]) -> CommitReport {
        let mut report = CommitReport::default();
        if updates.is_empty() {
            return report;
        }
        if !self.cool_off.is_zero() {
            debug!("Cooling off for {:?} before writing", self.cool_off);
            thread::sleep(self.cool_off);
        }

        for update in updates {
            let document = &update.document;
            let name = document.name().to_string();

            match self.store.last_modified(document) {
                Ok(on_disk) if on_disk != document.last_modified() => {
                    warn!(
                        "Document '{}' changed on disk since it was read; not writing it",
                        name
                    );
                    report.skipped.push(name);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Could not check document '{}' before writing: {}", name, e);
                    report.failed.push(name);
                    continue;
                }
            }

            let content = match rewrite_document(update) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Could not rewrite document '{}': {}", name, e);
                    report.failed.push(name);
                    continue;
                }
            };
            if content == document.text() {
                debug!("Document '{}' is already up to date", name);
                report.skipped.push(name);
                continue;
            }

            match self.store.write(document, &content) {
                Ok(modified) => {
                    info!("Updated document '{}'", name);
                    report.written.push((name, modified));
                }
                Err(e) => {
                    warn!("Could not write document '{}': {}", name, e);
                    report.failed.push(name);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryOutput, QuerySite};
    use crate::vault::{Document, FileSystemVault};
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};
    use std::fs;
    use std::io;
    use std::path::PathBuf;

    /// Keeps documents in memory with a modification time per name.
    #[derive(Default)]
    struct MemoryStore {
        modified: Mutex<HashMap<String, u64>>,
        written: Mutex<HashMap<String, String>>,
    }

    impl DocumentStore for MemoryStore {
        fn resolve_path(&self, document: &Document) -> PathBuf {
            PathBuf::from(format!("{}.md", document.name()))
        }

        fn last_modified(&self, document: &Document) -> io::Result<u64> {
            self.modified
                .lock()
                .get(document.name())
                .copied()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }

        fn write(&self, document: &Document, content: &str) -> io::Result<u64> {
            self.written
                .lock()
                .insert(document.name().to_string(), content.to_string());
            let mut modified = self.modified.lock();
            let time = modified.entry(document.name().to_string()).or_insert(0);
            *time += 1;
            Ok(*time)
        }
    }

    fn update(name: &str, modified: u64, output: &str) -> DocumentUpdate {
        let document = Arc::new(Document::parse(
            name,
            "",
            modified,
            "<!--query:list-->\n<!--/query-->\n",
        ));
        let (id, _) = document.query_blocks().next().unwrap();
        let site = QuerySite::new(document.clone(), id).unwrap();
        DocumentUpdate {
            document,
            front_matter: None,
            outputs: BTreeMap::from([(id, QueryOutput::new(site, output))]),
        }
    }

    #[test]
    fn test_document_changed_on_disk_is_skipped() {
        let store = Arc::new(MemoryStore::default());
        store.modified.lock().insert("fresh".to_string(), 10);
        store.modified.lock().insert("raced".to_string(), 25);
        let committer = DocumentCommitter::new(store.clone(), Duration::ZERO);

        let report = committer.commit(&[update("fresh", 10, "x"), update("raced", 20, "y")]);

        assert_eq!(report.written, vec![("fresh".to_string(), 11)]);
        assert_eq!(report.skipped, vec!["raced".to_string()]);
        assert!(report.failed.is_empty());
        assert!(!store.written.lock().contains_key("raced"));
    }

    #[test]
    fn test_missing_document_is_a_failure() {
        let store = Arc::new(MemoryStore::default());
        let committer = DocumentCommitter::new(store, Duration::ZERO);
        let report = committer.commit(&[update("gone", 1, "x")]);
        assert_eq!(report.failed, vec!["gone".to_string()]);
    }

    #[test]
    fn test_writes_to_file_system() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "<!--query:list-->\n<!--/query-->\n").unwrap();
        let store = Arc::new(FileSystemVault::new(dir.path()).unwrap());
        let vault = store.load().unwrap();
        let document = vault.document("doc").unwrap().clone();
        let (id, _) = document.query_blocks().next().unwrap();
        let site = QuerySite::new(document.clone(), id).unwrap();
        let update = DocumentUpdate {
            document,
            front_matter: None,
            outputs: BTreeMap::from([(id, QueryOutput::new(site, "- [[a]]"))]),
        };

        let report = DocumentCommitter::new(store, Duration::from_millis(1)).commit(&[update]);

        assert_eq!(report.written.len(), 1);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!--query:list-->\n- [[a]]\n<!--/query ("));
    }
}
