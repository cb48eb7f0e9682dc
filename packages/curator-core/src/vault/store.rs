use super::{Document, Vault};
use crate::change::{Change, Payload};
use crate::error::{CuratorError, Result};
use crate::watcher::FileChangeEvent;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MARKDOWN_EXTENSION: &str = "md";

/// Persistent side of the vault, used by the commit step.
pub trait DocumentStore: Send + Sync {
    /// Where the document lives on disk.
    fn resolve_path(&self, document: &Document) -> PathBuf;

    /// Current modification time on disk, in milliseconds since the Unix epoch.
    fn last_modified(&self, document: &Document) -> io::Result<u64>;

    /// Replaces the document's content and returns the new modification time.
    fn write(&self, document: &Document, content: &str) -> io::Result<u64>;
}

/// A vault rooted in a directory on the local file system.
///
/// Hidden files and folders (name starting with `.`) are not part of the
/// vault, and only `.md` files are documents.
#[derive(Debug, Clone)]
pub struct FileSystemVault {
    root: PathBuf,
}

impl FileSystemVault {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CuratorError::vault(format!(
                "Vault root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the vault: the root directory's name.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string())
    }

    /// Reads the whole vault from disk.
    pub fn load(&self) -> Result<Vault> {
        let mut vault = Vault::new(self.name());
        self.load_into(&mut vault, &self.root)?;
        info!(
            "Loaded vault '{}' with {} documents from {}",
            vault.name(),
            vault.document_count(),
            self.root.display()
        );
        Ok(vault)
    }

    fn load_into(&self, vault: &mut Vault, directory: &Path) -> Result<()> {
        let walker = WalkDir::new(directory)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
        for entry in walker {
            let entry = entry.map_err(CuratorError::vault)?;
            let Some(relative) = self.relative_folder_and_name(entry.path()) else {
                continue;
            };
            if entry.file_type().is_dir() {
                vault.insert_folder(&join_relative(&relative));
            } else if is_markdown(entry.path()) {
                let (folder, name) = relative;
                match self.read_document(entry.path(), &folder, &name) {
                    Ok(document) => {
                        vault.insert_document(document);
                    }
                    Err(e) => warn!("Could not read {}: {}", entry.path().display(), e),
                }
            }
        }
        Ok(())
    }

    /// Applies one file-system event to `vault` and describes it as a change.
    ///
    /// Returns `None` for events outside the vault model (hidden paths,
    /// non-Markdown files, unknown folders, unreadable files).
    pub fn apply(&self, vault: &mut Vault, event: &FileChangeEvent) -> Option<Change> {
        let path = event.path();
        let (folder, name) = self.relative_folder_and_name(path)?;
        if folder.split('/').chain([name.as_str()]).any(|p| p.starts_with('.')) {
            return None;
        }

        match event {
            FileChangeEvent::Created(_) | FileChangeEvent::Modified(_) => {
                if path.is_dir() {
                    let relative = join_relative(&(folder, name));
                    if !vault.insert_folder(&relative) {
                        return None;
                    }
                    if let Err(e) = self.load_into(vault, path) {
                        warn!("Could not read folder {}: {}", path.display(), e);
                    }
                    return Some(Change::create(Payload::Folder(Arc::from(relative))));
                }
                if !is_markdown(path) {
                    return None;
                }
                let document = match self.read_document(path, &folder, &name) {
                    Ok(document) => document,
                    Err(e) => {
                        warn!("Could not read {}: {}", path.display(), e);
                        return None;
                    }
                };
                let new = {
                    let name = document.name().to_string();
                    let previous = vault.insert_document(document);
                    let new = vault.document(&name)?.clone();
                    (previous, new)
                };
                match new {
                    (Some(old), new) => Some(Change::update(
                        Payload::Document(old),
                        Payload::Document(new),
                    )),
                    (None, new) => Some(Change::create(Payload::Document(new))),
                }
            }
            FileChangeEvent::Deleted(_) => {
                if is_markdown(path) {
                    let known = vault.document(&name).is_some_and(|d| d.folder() == folder);
                    if !known {
                        return None;
                    }
                    let removed = vault.remove_document(&name)?;
                    return Some(Change::delete(Payload::Document(removed)));
                }
                let relative = join_relative(&(folder, name));
                if !vault.has_folder(&relative) {
                    return None;
                }
                let removed = vault.remove_folder(&relative);
                debug!(
                    "Folder '{}' removed with {} documents",
                    relative,
                    removed.len()
                );
                Some(Change::delete(Payload::Folder(Arc::from(relative))))
            }
        }
    }

    fn read_document(&self, path: &Path, folder: &str, name: &str) -> io::Result<Document> {
        let metadata = fs::metadata(path)?;
        let text = fs::read_to_string(path)?;
        Ok(Document::parse(name, folder, modified_millis(&metadata)?, &text))
    }

    /// Splits a path below the root into (folder, file stem), both vault-relative.
    fn relative_folder_and_name(&self, path: &Path) -> Option<(String, String)> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let last = parts.pop()?;
        let name = match Path::new(&last).extension() {
            Some(ext) if ext == MARKDOWN_EXTENSION => Path::new(&last)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(last),
            _ => last,
        };
        Some((parts.join("/"), name))
    }
}

impl DocumentStore for FileSystemVault {
    fn resolve_path(&self, document: &Document) -> PathBuf {
        let mut path = self.root.clone();
        for part in document.folder().split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.push(format!("{}.{}", document.name(), MARKDOWN_EXTENSION));
        path
    }

    fn last_modified(&self, document: &Document) -> io::Result<u64> {
        modified_millis(&fs::metadata(self.resolve_path(document))?)
    }

    fn write(&self, document: &Document, content: &str) -> io::Result<u64> {
        let path = self.resolve_path(document);
        fs::write(&path, content)?;
        modified_millis(&fs::metadata(&path)?)
    }
}

pub(crate) fn modified_millis(metadata: &fs::Metadata) -> io::Result<u64> {
    let modified = metadata.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(since_epoch.as_millis() as u64)
}

fn join_relative((folder, name): &(String, String)) -> String {
    if folder.is_empty() {
        name.clone()
    } else {
        format!("{}/{}", folder, name)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MARKDOWN_EXTENSION)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
