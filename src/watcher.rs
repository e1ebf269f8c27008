use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::errors::TruthResult;
use crate::storage::FileStore;

/// Observes one history file for changes made by other processes.
pub struct HistoryWatcher {
    dir: PathBuf,
    file_name: OsString,
}

impl HistoryWatcher {
    pub fn new(store: &FileStore, key: &str) -> TruthResult<Self> {
        let path = store.path_for(key)?;
        let file_name = path.file_name().map(OsString::from).unwrap_or_default();
        Ok(Self {
            dir: store.dir().to_path_buf(),
            file_name,
        })
    }

    /// Whether `event` touches the watched history file
    pub fn is_relevant(&self, event: &Event) -> bool {
        let changes_content = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        );
        changes_content && event.paths.iter().any(|path| self.matches(path))
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name().map_or(false, |name| name == self.file_name.as_os_str())
    }

    /// Call `on_change` each time the history file changes. Runs until the
    /// watcher shuts down.
    pub async fn watch<F>(&self, mut on_change: F) -> TruthResult<()>
    where
        F: FnMut(),
    {
        log::info!("Watching {:?} in {:?}", self.file_name, self.dir);

        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(100);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // Runs on notify's own thread
                let _ = tx.blocking_send(res);
            },
            Config::default(),
        )?;

        // The store replaces the file by rename, so watch the directory
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        while let Some(res) = rx.recv().await {
            let mut changed = match res {
                Ok(event) => self.is_relevant(&event),
                Err(e) => {
                    log::error!("Watch error: {:?}", e);
                    false
                }
            };

            // One atomic write shows up as several events; report it once
            while let Ok(res) = rx.try_recv() {
                if let Ok(event) = res {
                    changed |= self.is_relevant(&event);
                }
            }

            if changed {
                log::debug!("History file {:?} changed", self.file_name);
                on_change();
            }
        }

        Ok(())
    }
}
