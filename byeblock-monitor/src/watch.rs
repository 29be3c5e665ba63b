//! Live reload of the proxy settings file.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use byeblock_core::{Error, ProxyStore, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Reloads a shared [`ProxyStore`] whenever its file changes on disk.
///
/// The parent directory is watched rather than the file itself, because
/// [`ProxyStore::save`] replaces the file through a rename. Unreadable
/// contents are logged and the previous store is kept. Dropping the watcher
/// stops reloading.
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl SettingsWatcher {
    /// Starts watching `path`. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`Error::Io`] when the directory cannot be watched.
    pub fn spawn(path: impl Into<PathBuf>, store: Arc<RwLock<ProxyStore>>) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| Error::config(format!("settings path {} has no file name", path.display())))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(watch_error)?;
        watcher.watch(&dir, RecursiveMode::NonRecursive).map_err(watch_error)?;
        info!(path = %path.display(), "watching proxy settings");

        let task = tokio::spawn(reload_loop(path, file_name, store, rx));
        Ok(Self { _watcher: watcher, task })
    }
}

impl Drop for SettingsWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn watch_error(e: notify::Error) -> Error {
    Error::Io(io::Error::other(e))
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str()))
}

fn reload(path: &Path, store: &RwLock<ProxyStore>) {
    match ProxyStore::load(path) {
        Ok(fresh) => {
            debug!(path = %path.display(), selected = ?fresh.selected_id(), "proxy settings reloaded");
            *store.write() = fresh;
        }
        Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable proxy settings"),
    }
}

async fn reload_loop(
    path: PathBuf,
    file_name: OsString,
    store: Arc<RwLock<ProxyStore>>,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
) {
    while let Some(res) = events.recv().await {
        match res {
            Ok(event) if touches(&event, &file_name) => reload(&path, &store),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "settings watch error"),
        }
    }
}
