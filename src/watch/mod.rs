//! # Background Watchers
//!
//! Watchers observing cluster API-surface changes and kubeconfig file
//! changes. Both debounce bursts of change and fire a reload callback once
//! the quiet period elapses.

pub mod cluster_state;
pub mod kubeconfig;

use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;

/// Callback invoked by a watcher when a change settles. Errors are logged
/// by the watcher; the watch loop keeps running.
pub type ReloadCallback = Arc<dyn Fn() -> Result<()> + Send + Sync>;

pub use cluster_state::ClusterStateWatcher;
pub use kubeconfig::KubeconfigWatcher;

/// Read a duration in milliseconds from the environment. Values that do
/// not parse as strictly positive integers fall back to the default.
pub(crate) fn duration_from_env(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => default,
        },
        Err(_) => default,
    }
}
