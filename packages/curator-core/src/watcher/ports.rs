//! Interface definitions for vault watching.

use crate::error::{CuratorError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// A debounced change to a path below the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

impl FileChangeEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileChangeEvent::Created(p) => p,
            FileChangeEvent::Modified(p) => p,
            FileChangeEvent::Deleted(p) => p,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            FileChangeEvent::Created(_) => "created",
            FileChangeEvent::Modified(_) => "modified",
            FileChangeEvent::Deleted(_) => "deleted",
        }
    }

    /// Combines an event still waiting in the debounce window with a newer
    /// one for the same path.
    pub fn merge(self, newer: FileChangeEvent) -> FileChangeEvent {
        match (self, newer) {
            (FileChangeEvent::Created(_), FileChangeEvent::Modified(p)) => {
                FileChangeEvent::Created(p)
            }
            // Editors that save by delete-and-recreate.
            (FileChangeEvent::Deleted(_), FileChangeEvent::Created(p)) => {
                FileChangeEvent::Modified(p)
            }
            (_, newer) => newer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub root_path: PathBuf,

    /// File extensions to report. Directories are always reported.
    pub extensions: Vec<String>,

    /// Quiet period a path must see before its event is delivered.
    pub debounce_duration: Duration,

    /// Patterns to ignore (`**/name/**` matches a path component, anything
    /// else is a substring match).
    pub ignore_patterns: Vec<String>,

    pub recursive: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            extensions: vec!["md".to_string()],
            debounce_duration: Duration::from_millis(100),
            ignore_patterns: default_ignore_patterns(),
            recursive: true,
        }
    }
}

pub fn default_ignore_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/.obsidian/**".to_string(),
        "**/.trash/**".to_string(),
    ]
}

/// Receives debounced events on the watcher's processor thread.
///
/// Events are delivered one at a time, so a handler never runs concurrently
/// with itself.
pub trait FileEventHandler: Send {
    fn handle_event(&mut self, event: FileChangeEvent) -> Result<()>;

    fn handle_error(&mut self, error: CuratorError);
}
