//! Debounced filesystem watching that triggers incremental re-ingestion.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use scopegraph_indexer::ingest::run_incremental;
use scopegraph_indexer::store::{IngestionExecutor, StoreConfig};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Events emitted by the file watcher, already filtered down to paths worth
/// re-ingesting over.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Watches a project root and debounces bursts of filesystem events into a
/// single re-ingestion trigger.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => Self::handle_notify_event(event, &event_tx),
            Err(error) => error!(%error, "filesystem watch error"),
        })?;

        Ok(Self { watcher, event_rx, root })
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let wrap = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if should_ignore_path(&path) {
                continue;
            }
            if event_tx.send(wrap(path)).is_err() {
                debug!("watch event receiver dropped");
            }
        }
    }

    pub fn start(&mut self) -> Result<()> {
        info!(root = %self.root.display(), "watching project root");
        self.watcher.watch(&self.root, RecursiveMode::Recursive)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn recv(&mut self) -> Option<WatchEvent> {
        self.event_rx.recv().await
    }
}

fn should_ignore_path(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c.as_os_str().to_str(), Some("target" | ".git" | "node_modules")))
}

/// Runs the watch loop: debounces events over `debounce` before triggering a
/// single incremental re-ingestion pass covering every changed file seen in
/// that window.
pub async fn run_watch_loop(
    mut watcher: FileWatcher,
    include: Vec<String>,
    exclude: Vec<String>,
    debounce: Duration,
) -> Result<()> {
    watcher.start()?;
    let root = watcher.root().to_path_buf();

    loop {
        let Some(first) = watcher.recv().await else {
            break;
        };
        let mut changed = HashSet::new();
        insert_changed(&mut changed, first);

        loop {
            tokio::select! {
                event = watcher.recv() => match event {
                    Some(event) => insert_changed(&mut changed, event),
                    None => break,
                },
                _ = sleep(debounce) => break,
            }
        }

        if changed.is_empty() {
            continue;
        }
        info!(files = changed.len(), "debounced change batch, re-ingesting");
        if let Err(error) = reingest(&root, &include, &exclude).await {
            warn!(%error, "incremental re-ingestion failed");
        }
    }

    Ok(())
}

fn insert_changed(changed: &mut HashSet<PathBuf>, event: WatchEvent) {
    match event {
        WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => {
            changed.insert(path);
        }
    }
}

async fn reingest(root: &Path, include: &[String], exclude: &[String]) -> Result<()> {
    let store_config = StoreConfig::from_env()?;
    let executor = IngestionExecutor::connect(&store_config).await?;
    executor.bootstrap_schema().await?;

    let outcome = run_incremental(root, include, exclude, &executor).await?;

    info!(
        files_parsed = outcome.stats.files_parsed,
        files_failed = outcome.stats.files_failed,
        created = outcome.counts.created,
        updated = outcome.counts.updated,
        unchanged = outcome.counts.unchanged,
        deleted = outcome.counts.deleted,
        nodes_written = outcome.report.nodes_written,
        edges_written = outcome.report.edges_written,
        "incremental re-ingestion complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_vcs_and_dependency_directories() {
        assert!(should_ignore_path(Path::new("target/debug/out.rs")));
        assert!(should_ignore_path(Path::new("project/.git/HEAD")));
        assert!(should_ignore_path(Path::new("project/node_modules/pkg/index.js")));
        assert!(!should_ignore_path(Path::new("src/main.rs")));
    }

    #[tokio::test]
    async fn watcher_creation_succeeds_for_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FileWatcher::new(dir.path());
        assert!(watcher.is_ok());
    }
}
