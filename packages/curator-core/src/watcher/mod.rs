//! File-system monitoring of the vault directory.

mod file_watcher;
mod ports;

pub use file_watcher::FileWatcher;
pub use ports::{default_ignore_patterns, FileChangeEvent, FileEventHandler, WatchConfig};
