//! Watch over the status file directory
//!
//! Host processes rewrite per-component status files out of band, usually
//! by writing a temp file and renaming it over the old one. The watcher
//! scans everything once at startup, then holds a directory-scoped watch:
//! each notified path is re-parsed and its cache entry replaced wholesale.
//! Watching the directory rather than the files keeps the watch alive
//! across rename-over replaces; if the watch itself dies it is
//! re-established and the directory rescanned.

use crate::error::{RelayError, Result};
use crate::state::StateCache;
use crate::statusfile;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const STATUS_EXTENSION: &str = "plist";
const REWATCH_DELAY: Duration = Duration::from_secs(5);

/// Keeps the component state map in sync with the status directory
pub struct StatusFileWatcher {
    status_dir: PathBuf,
    cache: Arc<StateCache>,
}

impl StatusFileWatcher {
    pub fn new(status_dir: PathBuf, cache: Arc<StateCache>) -> Self {
        Self { status_dir, cache }
    }

    /// Initial full scan, then the watch loop; never returns
    pub async fn run(self) {
        if let Err(e) = self.scan_all().await {
            warn!("initial status scan failed: {e}");
        }
        loop {
            match self.watch_loop().await {
                Ok(()) => warn!("status watch channel closed; re-establishing"),
                Err(e) => warn!("status watch failed: {e}; re-establishing"),
            }
            tokio::time::sleep(REWATCH_DELAY).await;
            // catch whatever changed while unwatched
            if let Err(e) = self.scan_all().await {
                warn!("status rescan failed: {e}");
            }
        }
    }

    /// Parse every status file currently in the directory
    async fn scan_all(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.status_dir).await.map_err(|e| {
            RelayError::watch(format!("read_dir {}: {e}", self.status_dir.display()))
        })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RelayError::watch(format!("read_dir: {e}")))?
        {
            let path = entry.path();
            if is_status_file(&path) {
                self.reparse(&path).await;
            }
        }
        Ok(())
    }

    async fn watch_loop(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(100);
        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                let _ = tx.blocking_send(res);
            })?;
        watcher.watch(&self.status_dir, RecursiveMode::NonRecursive)?;
        info!("watching status directory {}", self.status_dir.display());

        // watcher must stay alive for as long as we drain its channel
        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) => self.handle_event(event).await,
                Err(e) => warn!("status watch event error: {e}"),
            }
        }
        Ok(())
    }

    async fn handle_event(&self, event: Event) {
        // Atomic rewrites surface as create/rename pairs; removals are
        // ignored outright so the entry stays at its last good value while
        // the writer is mid-swap.
        if matches!(event.kind, EventKind::Remove(_)) {
            return;
        }
        for path in &event.paths {
            if is_status_file(path) && path.exists() {
                self.reparse(path).await;
            }
        }
    }

    async fn reparse(&self, path: &Path) {
        let Some(id) = component_id(path) else {
            return;
        };
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot read {}: {e}", path.display());
                return;
            }
        };
        match statusfile::parse(&text) {
            Ok(attributes) => {
                if self.cache.set_component_state(&id, attributes).await {
                    debug!("component '{id}' state replaced");
                }
            }
            // previous entry stays: stale-but-valid beats absent
            Err(e) => warn!("cannot parse {}: {e}", path.display()),
        }
    }
}

fn is_status_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(STATUS_EXTENSION)
}

fn component_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}
