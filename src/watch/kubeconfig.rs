//! Kubeconfig file watcher.
//!
//! Observes the kubeconfig for content changes (size, mtime, and content
//! hash) and fires the reload callback after a debounce window. Close
//! semantics match the cluster-state watcher: stop, wait for
//! acknowledgement, and cancel any pending debounce.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

use crate::watch::{duration_from_env, ReloadCallback};

const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);
const CHECK_INTERVAL: Duration = Duration::from_secs(1);

const DEBOUNCE_WINDOW_ENV: &str = "KUBECONFIG_DEBOUNCE_WINDOW_MS";

/// Observed identity of the kubeconfig file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileFingerprint {
    size: u64,
    modified: Option<SystemTime>,
    content_hash: [u8; 32],
}

fn fingerprint(path: &Path) -> Option<FileFingerprint> {
    let metadata = std::fs::metadata(path).ok()?;
    let contents = std::fs::read(path).ok()?;
    let content_hash: [u8; 32] = Sha256::digest(&contents).into();
    Some(FileFingerprint { size: metadata.len(), modified: metadata.modified().ok(), content_hash })
}

/// Watcher observing a kubeconfig file for changes.
pub struct KubeconfigWatcher {
    path: PathBuf,
    pub(crate) check_interval: Duration,
    pub(crate) debounce_window: Duration,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    stop_rx: Mutex<Option<oneshot::Receiver<()>>>,
    stopped_tx: Mutex<Option<oneshot::Sender<()>>>,
    stopped_rx: AsyncMutex<Option<oneshot::Receiver<()>>>,
    started: AtomicBool,
}

impl KubeconfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        Self {
            path: path.into(),
            check_interval: CHECK_INTERVAL,
            debounce_window: duration_from_env(DEBOUNCE_WINDOW_ENV, DEFAULT_DEBOUNCE_WINDOW),
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx: Mutex::new(Some(stop_rx)),
            stopped_tx: Mutex::new(Some(stopped_tx)),
            stopped_rx: AsyncMutex::new(Some(stopped_rx)),
            started: AtomicBool::new(false),
        }
    }

    /// Start the watch loop on a background task. Calling watch twice is a
    /// no-op.
    pub fn watch(self: &Arc<Self>, callback: ReloadCallback) {
        let (Some(mut stop_rx), Some(stopped_tx)) =
            (self.stop_rx.lock().unwrap().take(), self.stopped_tx.lock().unwrap().take())
        else {
            return;
        };
        self.started.store(true, Ordering::SeqCst);

        let watcher = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(watcher.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut last_known = fingerprint(&watcher.path);
            let mut debounce: Option<std::pin::Pin<Box<tokio::time::Sleep>>> = None;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let current = fingerprint(&watcher.path);
                        if current != last_known {
                            debug!(path = %watcher.path.display(), "kubeconfig changed, arming debounce");
                            last_known = current;
                            debounce = Some(Box::pin(tokio::time::sleep(watcher.debounce_window)));
                        }
                    }
                    _ = async { debounce.as_mut().expect("guarded").await }, if debounce.is_some() => {
                        debounce = None;
                        if let Err(e) = callback() {
                            warn!(error = %e, "kubeconfig reload callback failed");
                        }
                    }
                }
            }

            let _ = stopped_tx.send(());
        });
    }

    /// Stop the watch loop. Blocks until the loop acknowledges so no
    /// callback fires after close returns. Safe to call on an unstarted or
    /// already-closed watcher.
    pub async fn close(&self) {
        let Some(stop) = self.stop_tx.lock().unwrap().take() else {
            return;
        };
        let _ = stop.send(());

        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        if let Some(stopped) = self.stopped_rx.lock().await.take() {
            let _ = stopped.await;
        }
    }
}
