//! Vault watcher on top of the `notify` crate.
//!
//! Raw notifications are filtered (extensions, ignore patterns) and debounced
//! per path on a single processor thread, which then hands each event to the
//! [`FileEventHandler`]. Because there is exactly one processor thread, handler
//! invocations never overlap.

use super::ports::{FileChangeEvent, FileEventHandler, WatchConfig};
use crate::error::{CuratorError, Result};
use notify::event::ModifyKind;
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct FileWatcher {
    config: WatchConfig,
    handler: Arc<Mutex<dyn FileEventHandler>>,
    watcher: Option<RecommendedWatcher>,
    event_tx: Option<Sender<Event>>,
    event_rx: Option<Receiver<Event>>,
    processor_thread: Option<thread::JoinHandle<()>>,
    running: Arc<Mutex<bool>>,
}

impl FileWatcher {
    pub fn new(config: WatchConfig, handler: Arc<Mutex<dyn FileEventHandler>>) -> Result<Self> {
        if !config.root_path.is_dir() {
            return Err(CuratorError::watcher(format!(
                "Root path is not a directory: {}",
                config.root_path.display()
            )));
        }

        let (event_tx, event_rx) = channel();

        Ok(Self {
            config,
            handler,
            watcher: None,
            event_tx: Some(event_tx),
            event_rx: Some(event_rx),
            processor_thread: None,
            running: Arc::new(Mutex::new(false)),
        })
    }

    /// Starts watching and spawns the processor thread.
    pub fn start(&mut self) -> Result<()> {
        if *self.running.lock() {
            return Err(CuratorError::watcher("Watcher already running"));
        }

        if self.event_rx.is_none() {
            let (tx, rx) = channel();
            self.event_tx = Some(tx);
            self.event_rx = Some(rx);
        }

        let event_tx = self
            .event_tx
            .as_ref()
            .ok_or_else(|| CuratorError::watcher("Event transmitter not available"))?
            .clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => error!("File watcher error: {}", e),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| CuratorError::watcher(format!("Failed to create watcher: {}", e)))?;

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&self.config.root_path, mode)
            .map_err(|e| CuratorError::watcher(format!("Failed to watch path: {}", e)))?;
        self.watcher = Some(watcher);

        let event_rx = self
            .event_rx
            .take()
            .ok_or_else(|| CuratorError::watcher("Event receiver not available"))?;
        let handler = self.handler.clone();
        let config = self.config.clone();
        let running = self.running.clone();

        *running.lock() = true;
        self.processor_thread = Some(thread::spawn(move || {
            Self::process_events(event_rx, handler, config, running);
        }));

        debug!("Watching {}", self.config.root_path.display());
        Ok(())
    }

    /// Stops watching and joins the processor thread.
    pub fn stop(&mut self) -> Result<()> {
        if !*self.running.lock() {
            return Ok(());
        }
        *self.running.lock() = false;
        self.watcher = None;
        self.join()
    }

    /// Blocks until the processor thread exits.
    pub fn wait(&mut self) -> Result<()> {
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        if let Some(thread) = self.processor_thread.take() {
            thread
                .join()
                .map_err(|_| CuratorError::watcher("Failed to join processor thread"))?;
        }
        Ok(())
    }

    /// Trailing debounce: an event is delivered once its path has been quiet
    /// for the debounce window, merged with everything seen in between.
    fn process_events(
        event_rx: Receiver<Event>,
        handler: Arc<Mutex<dyn FileEventHandler>>,
        config: WatchConfig,
        running: Arc<Mutex<bool>>,
    ) {
        let mut pending: HashMap<PathBuf, (FileChangeEvent, Instant)> = HashMap::new();

        while *running.lock() {
            match event_rx.recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    for change in Self::convert_event(&event, &config) {
                        let path = change.path().clone();
                        let merged = match pending.remove(&path) {
                            Some((earlier, _)) => earlier.merge(change),
                            None => change,
                        };
                        pending.insert(path, (merged, Instant::now()));
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            Self::flush(&mut pending, &handler, config.debounce_duration);
        }
    }

    fn flush(
        pending: &mut HashMap<PathBuf, (FileChangeEvent, Instant)>,
        handler: &Arc<Mutex<dyn FileEventHandler>>,
        debounce: Duration,
    ) {
        let now = Instant::now();
        let mut ready: Vec<(PathBuf, Instant)> = pending
            .iter()
            .filter(|(_, (_, last_seen))| now.duration_since(*last_seen) >= debounce)
            .map(|(path, (_, last_seen))| (path.clone(), *last_seen))
            .collect();
        ready.sort_by_key(|(_, last_seen)| *last_seen);

        for (path, _) in ready {
            if let Some((event, _)) = pending.remove(&path) {
                let mut handler = handler.lock();
                if let Err(e) = handler.handle_event(event) {
                    handler.handle_error(e);
                }
            }
        }
    }

    /// Maps a raw notification to vault events, dropping the ones the vault
    /// does not care about.
    fn convert_event(event: &Event, config: &WatchConfig) -> Vec<FileChangeEvent> {
        if let EventKind::Modify(ModifyKind::Name(_)) = event.kind {
            // Renames: the old path disappears, the new one appears.
            return event
                .paths
                .iter()
                .filter(|path| Self::is_relevant(path, config))
                .map(|path| {
                    if path.exists() {
                        FileChangeEvent::Created(path.clone())
                    } else {
                        FileChangeEvent::Deleted(path.clone())
                    }
                })
                .collect();
        }

        let Some(path) = event.paths.first() else {
            return Vec::new();
        };
        if !Self::is_relevant(path, config) {
            return Vec::new();
        }

        let change = match event.kind {
            EventKind::Create(_) => FileChangeEvent::Created(path.clone()),
            EventKind::Modify(ModifyKind::Data(_)) => FileChangeEvent::Modified(path.clone()),
            EventKind::Modify(ModifyKind::Any) | EventKind::Any => {
                if path.exists() {
                    FileChangeEvent::Modified(path.clone())
                } else {
                    FileChangeEvent::Deleted(path.clone())
                }
            }
            EventKind::Remove(_) => FileChangeEvent::Deleted(path.clone()),
            _ => return Vec::new(),
        };
        vec![change]
    }

    /// Ignore patterns first, then the extension filter. Paths without an
    /// extension pass, since they may be (removed) folders.
    fn is_relevant(path: &Path, config: &WatchConfig) -> bool {
        if Self::should_ignore(path, &config.ignore_patterns) {
            return false;
        }
        if config.extensions.is_empty() || path.is_dir() {
            return true;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => config.extensions.iter().any(|e| e == ext),
            None => true,
        }
    }

    fn should_ignore(path: &Path, ignore_patterns: &[String]) -> bool {
        let Some(path_str) = path.to_str() else {
            return false;
        };

        ignore_patterns.iter().any(|pattern| {
            if pattern.contains("**") {
                pattern
                    .split("**")
                    .map(|part| part.trim_matches('/'))
                    .filter(|part| !part.is_empty())
                    .any(|part| {
                        path_str.contains(&format!("/{}/", part))
                            || path_str.ends_with(&format!("/{}", part))
                            || path_str.starts_with(&format!("{}/", part))
                    })
            } else {
                path_str.contains(pattern.as_str())
            }
        })
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn config() -> WatchConfig {
        WatchConfig {
            root_path: PathBuf::from("/vault"),
            ..WatchConfig::default()
        }
    }

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_should_ignore_hidden_tool_folders() {
        let patterns = config().ignore_patterns;
        assert!(FileWatcher::should_ignore(
            Path::new("/vault/.obsidian/workspace.json"),
            &patterns
        ));
        assert!(FileWatcher::should_ignore(
            Path::new("/vault/.git/HEAD"),
            &patterns
        ));
        assert!(!FileWatcher::should_ignore(
            Path::new("/vault/notes/a.md"),
            &patterns
        ));
    }

    #[test]
    fn test_convert_event_filters_extensions() {
        let config = config();
        let created = event(EventKind::Create(CreateKind::File), "/vault/a.md");
        assert_eq!(
            FileWatcher::convert_event(&created, &config),
            vec![FileChangeEvent::Created(PathBuf::from("/vault/a.md"))]
        );

        let image = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/vault/a.png",
        );
        assert!(FileWatcher::convert_event(&image, &config).is_empty());

        let removed_folder = event(EventKind::Remove(RemoveKind::Folder), "/vault/notes");
        assert_eq!(
            FileWatcher::convert_event(&removed_folder, &config),
            vec![FileChangeEvent::Deleted(PathBuf::from("/vault/notes"))]
        );
    }

    struct Recorder(Vec<FileChangeEvent>);

    impl FileEventHandler for Recorder {
        fn handle_event(&mut self, event: FileChangeEvent) -> Result<()> {
            self.0.push(event);
            Ok(())
        }

        fn handle_error(&mut self, _error: CuratorError) {}
    }

    #[test]
    fn test_flush_delivers_only_quiet_paths() {
        let recorder = Arc::new(Mutex::new(Recorder(Vec::new())));
        let handler: Arc<Mutex<dyn FileEventHandler>> = recorder.clone();
        let mut pending = HashMap::new();
        let path = PathBuf::from("/vault/a.md");
        pending.insert(
            path.clone(),
            (FileChangeEvent::Modified(path.clone()), Instant::now()),
        );

        FileWatcher::flush(&mut pending, &handler, Duration::from_secs(60));
        assert!(recorder.lock().0.is_empty());

        FileWatcher::flush(&mut pending, &handler, Duration::ZERO);
        assert_eq!(recorder.lock().0, vec![FileChangeEvent::Modified(path)]);
        assert!(pending.is_empty());
    }
}
