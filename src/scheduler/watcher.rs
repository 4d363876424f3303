//! Filesystem and timer triggers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::scheduler::queue::{PassKind, PassQueue};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to start filesystem watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("failed to watch {path}: {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Keeps the watch subscription and the ticker alive. Dropping it stops
/// both.
pub struct WatchScheduler {
    _watcher: RecommendedWatcher,
    ticker: Option<JoinHandle<()>>,
}

impl WatchScheduler {
    /// Trigger every kind in `kinds` on any change below `paths`, and, when
    /// `interval` is set, on a fixed cadence starting immediately.
    pub fn spawn(
        paths: &[PathBuf],
        interval: Option<Duration>,
        kinds: Vec<PassKind>,
        queue: PassQueue,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self, WatchError> {
        let watcher = Self::subscribe(paths, kinds.clone(), queue.clone())?;

        let ticker = interval.map(|every| tokio::spawn(Self::tick(every, kinds, queue, shutdown)));

        Ok(Self {
            _watcher: watcher,
            ticker,
        })
    }

    fn subscribe(paths: &[PathBuf], kinds: Vec<PassKind>, queue: PassQueue) -> Result<RecommendedWatcher, WatchError> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_access() => {}
                Ok(event) => {
                    tracing::info!(paths = ?event.paths, kind = ?event.kind, "Received a filesystem event, triggering");
                    for kind in &kinds {
                        queue.trigger(*kind);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(WatchError::Init)?;

        for path in paths {
            watch_path(&mut watcher, path)?;
        }
        tracing::info!(paths = ?paths, "Filesystem watcher started");
        Ok(watcher)
    }

    async fn tick(every: Duration, kinds: Vec<PassKind>, queue: PassQueue, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    tracing::info!(every = ?every, "Triggering due to time schedule");
                    for kind in &kinds {
                        queue.trigger(*kind);
                    }
                }
            }
        }
    }

    /// Stop the ticker and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            let _ = ticker.await;
        }
    }
}

impl Drop for WatchScheduler {
    fn drop(&mut self) {
        if let Some(ticker) = &self.ticker {
            ticker.abort();
        }
    }
}

fn watch_path(watcher: &mut RecommendedWatcher, path: &Path) -> Result<(), WatchError> {
    watcher
        .watch(path, RecursiveMode::Recursive)
        .map_err(|source| WatchError::Subscribe {
            path: path.to_path_buf(),
            source,
        })
}
