//! Cluster-state watcher.
//!
//! Polls the discovery API on a fixed interval, compares the captured
//! state against the previous snapshot, and fires the reload callback once
//! a debounce window has elapsed without further change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

use crate::cluster::RestMapper;
use crate::watch::{duration_from_env, ReloadCallback};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

const POLL_INTERVAL_ENV: &str = "CLUSTER_STATE_POLL_INTERVAL_MS";
const DEBOUNCE_WINDOW_ENV: &str = "CLUSTER_STATE_DEBOUNCE_WINDOW_MS";

const OPENSHIFT_API_GROUP: &str = "project.openshift.io";

/// Structural snapshot of the cluster's API surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterStateSnapshot {
    pub api_groups: Vec<String>,
    pub is_openshift: bool,
}

/// Watcher polling the discovery API for API-surface changes.
pub struct ClusterStateWatcher {
    client: kube::Client,
    mapper: Option<Arc<RestMapper>>,
    pub(crate) poll_interval: Duration,
    pub(crate) debounce_window: Duration,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    stop_rx: Mutex<Option<oneshot::Receiver<()>>>,
    stopped_tx: Mutex<Option<oneshot::Sender<()>>>,
    stopped_rx: AsyncMutex<Option<oneshot::Receiver<()>>>,
    started: AtomicBool,
}

impl ClusterStateWatcher {
    /// Create a watcher for the given cluster. The optional mapper has its
    /// discovery cache invalidated whenever a change is detected.
    pub fn new(client: kube::Client, mapper: Option<Arc<RestMapper>>) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        Self {
            client,
            mapper,
            poll_interval: duration_from_env(POLL_INTERVAL_ENV, DEFAULT_POLL_INTERVAL),
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
            let mut ticker = tokio::time::interval(watcher.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut last_known: Option<ClusterStateSnapshot> = None;
            let mut debounce: Option<std::pin::Pin<Box<tokio::time::Sleep>>> = None;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Some(mapper) = &watcher.mapper {
                            mapper.invalidate().await;
                        }
                        let snapshot = capture_state(&watcher.client).await;
                        match &last_known {
                            None => last_known = Some(snapshot),
                            Some(previous) if *previous != snapshot => {
                                debug!(
                                    groups = snapshot.api_groups.len(),
                                    "cluster state changed, arming debounce"
                                );
                                last_known = Some(snapshot);
                                debounce =
                                    Some(Box::pin(tokio::time::sleep(watcher.debounce_window)));
                            }
                            _ => {}
                        }
                    }
                    _ = async { debounce.as_mut().expect("guarded").await }, if debounce.is_some() => {
                        debounce = None;
                        if let Err(e) = callback() {
                            warn!(error = %e, "cluster state reload callback failed");
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

/// Capture the current API surface. Discovery failures yield an empty
/// group list; the previous snapshot stays authoritative upstream.
pub async fn capture_state(client: &kube::Client) -> ClusterStateSnapshot {
    let mut api_groups = match client.list_api_groups().await {
        Ok(group_list) => group_list.groups.into_iter().map(|g| g.name).collect::<Vec<_>>(),
        Err(e) => {
            debug!(error = %e, "discovery poll failed, treating API surface as empty");
            Vec::new()
        }
    };
    api_groups.sort();

    let is_openshift = api_groups.iter().any(|g| g == OPENSHIFT_API_GROUP);

    ClusterStateSnapshot { api_groups, is_openshift }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_structural_equality() {
        let a = ClusterStateSnapshot {
            api_groups: vec!["apps".to_string(), "batch".to_string()],
            is_openshift: false,
        };
        let b = a.clone();
        assert_eq!(a, b);

        let c = ClusterStateSnapshot {
            api_groups: vec!["apps".to_string()],
            is_openshift: false,
        };
        assert_ne!(a, c);

        let d = ClusterStateSnapshot { is_openshift: true, ..a.clone() };
        assert_ne!(a, d);
    }

    #[test]
    fn test_openshift_detection_by_group() {
        let snapshot = ClusterStateSnapshot {
            api_groups: vec!["apps".to_string(), OPENSHIFT_API_GROUP.to_string()],
            is_openshift: true,
        };
        assert!(snapshot.api_groups.contains(&OPENSHIFT_API_GROUP.to_string()));
    }
}
