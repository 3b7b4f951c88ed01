//! File watch for hot reload.
//!
//! The notify callback runs on the watcher's own thread and must not touch
//! the interpreter. It only records what happened and wakes the actor; the
//! actor drains the recorded changes during its next dispatch, under the
//! interop lock.

use crate::ScriptError;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchChange {
    /// Deleted, moved or renamed: unload.
    Removed,
    /// Closed after writing: reload from the same path.
    Written,
}

/// Map a notify event to the change it means for a watched script.
pub fn classify(kind: &EventKind) -> Option<WatchChange> {
    match kind {
        EventKind::Remove(_) => Some(WatchChange::Removed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchChange::Removed),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(WatchChange::Written),
        _ => None,
    }
}

/// Collapse a batch of changes. A removal wins over any number of writes.
pub fn coalesce(changes: &[WatchChange]) -> Option<WatchChange> {
    if changes.contains(&WatchChange::Removed) {
        Some(WatchChange::Removed)
    } else if changes.is_empty() {
        None
    } else {
        Some(WatchChange::Written)
    }
}

/// A live watch on one file. Dropping it stops the watch.
pub struct FileWatch {
    path: PathBuf,
    pending: Arc<Mutex<Vec<WatchChange>>>,
    _watcher: RecommendedWatcher,
}

impl FileWatch {
    /// Start watching `path`. `wake` is called from the watcher thread
    /// every time a relevant change is recorded.
    pub fn arm<F>(path: &Path, wake: F) -> Result<Self, ScriptError>
    where
        F: Fn() + Send + 'static,
    {
        let pending = Arc::new(Mutex::new(Vec::new()));
        let recorded = pending.clone();
        let watched = path.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(change) = classify(&event.kind) {
                    debug!(path = %watched.display(), ?change, "script file changed");
                    recorded.lock().push(change);
                    wake();
                }
            }
            Err(e) => warn!(path = %watched.display(), "file watch error: {}", e),
        })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path: path.to_path_buf(),
            pending,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Everything recorded since the last call, coalesced.
    pub fn take_change(&self) -> Option<WatchChange> {
        let changes = std::mem::take(&mut *self.pending.lock());
        coalesce(&changes)
    }
}

impl std::fmt::Debug for FileWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatch").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn classifies_events() {
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(WatchChange::Removed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(WatchChange::Removed)
        );
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            Some(WatchChange::Written)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            None
        );
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), None);
    }

    #[test]
    fn removal_wins() {
        use WatchChange::*;
        assert_eq!(coalesce(&[]), None);
        assert_eq!(coalesce(&[Written, Written]), Some(Written));
        assert_eq!(coalesce(&[Written, Removed, Written]), Some(Removed));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn deleting_the_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watched.rhai");
        std::fs::write(&path, "fn watched() { #{} }").unwrap();

        let (tx, rx) = mpsc::channel();
        let watch = FileWatch::arm(&path, move || {
            let _ = tx.send(());
        })
        .unwrap();

        std::fs::remove_file(&path).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // The removal may arrive after a burst of other events.
        let mut change = watch.take_change();
        while change != Some(WatchChange::Removed) {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
            change = watch.take_change();
        }
        assert_eq!(watch.path(), path);
    }
}
