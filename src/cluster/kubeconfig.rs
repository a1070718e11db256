//! Kubeconfig-backed multi-cluster target provider.
//!
//! Targets are the context names of a kubeconfig file. The file is
//! re-read when the kubeconfig watcher detects a change, and one
//! cluster-state watcher runs per target.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use crate::cluster::client::{build_derived_client, build_plain_client};
use crate::cluster::provider::{
    ClusterProvider, ReloadCallback, TokenExchangeCapability, TARGET_PARAMETER_NAME,
};
use crate::cluster::RestMapper;
use crate::config::{GvkRule, StaticConfig};
use crate::errors::{KubegateError, Result};
use crate::tokenexchange::TargetTokenExchangeConfig;
use crate::watch::cluster_state::capture_state;
use crate::watch::{ClusterStateWatcher, KubeconfigWatcher};

/// Parsed kubeconfig state, replaced wholesale on file change.
struct KubeconfigSnapshot {
    kubeconfig: Kubeconfig,
    contexts: Vec<String>,
    current_context: String,
}

fn load_snapshot(path: &Path) -> Result<KubeconfigSnapshot> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
        KubegateError::config_with_source(
            format!("failed to read kubeconfig from {}", path.display()),
            Box::new(e),
        )
    })?;

    let mut contexts: Vec<String> =
        kubeconfig.contexts.iter().map(|context| context.name.clone()).collect();
    contexts.sort();

    let current_context = kubeconfig.current_context.clone().unwrap_or_default();

    Ok(KubeconfigSnapshot { kubeconfig, contexts, current_context })
}

#[derive(Default)]
struct WatcherSet {
    cluster: Vec<Arc<ClusterStateWatcher>>,
    file: Option<Arc<KubeconfigWatcher>>,
}

/// Multi-cluster provider reading targets from a kubeconfig file.
pub struct KubeconfigClusterProvider {
    path: PathBuf,
    state: Arc<ArcSwap<KubeconfigSnapshot>>,
    rules: Arc<Vec<GvkRule>>,
    mappers: Arc<Mutex<HashMap<String, Arc<RestMapper>>>>,
    exchange_strategy: String,
    exchange_configs: HashMap<String, TargetTokenExchangeConfig>,
    watchers: AsyncMutex<WatcherSet>,
}

impl KubeconfigClusterProvider {
    pub async fn new(config: &StaticConfig) -> Result<Self> {
        let path = if config.kubeconfig.is_empty() {
            default_kubeconfig_path()
        } else {
            PathBuf::from(&config.kubeconfig)
        };

        let snapshot = load_snapshot(&path)?;

        let exchange_configs = config
            .cluster_provider_configs
            .iter()
            .filter_map(|(target, c)| {
                c.token_exchange.clone().map(|exchange| (target.clone(), exchange))
            })
            .collect();

        Ok(Self {
            path,
            state: Arc::new(ArcSwap::from_pointee(snapshot)),
            rules: Arc::new(config.denied_resources.clone()),
            mappers: Arc::new(Mutex::new(HashMap::new())),
            exchange_strategy: config.token_exchange_strategy.clone(),
            exchange_configs,
            watchers: AsyncMutex::new(WatcherSet::default()),
        })
    }

    /// Resolve the target's kube configuration from the current snapshot.
    async fn kube_config_for(&self, target: &str) -> Result<kube::Config> {
        let snapshot = self.state.load();
        let options =
            KubeConfigOptions { context: Some(target.to_string()), ..Default::default() };

        kube::Config::from_custom_kubeconfig(snapshot.kubeconfig.clone(), &options)
            .await
            .map_err(|e| {
                KubegateError::config_with_source(
                    format!("failed to build configuration for context \"{}\"", target),
                    Box::new(e),
                )
            })
    }

    fn mapper_for(&self, target: &str, kube_config: &kube::Config) -> Result<Arc<RestMapper>> {
        let mut mappers = self.mappers.lock().unwrap();
        if let Some(mapper) = mappers.get(target) {
            return Ok(mapper.clone());
        }
        let plain = build_plain_client(kube_config.clone())?;
        let mapper = Arc::new(RestMapper::new(plain));
        mappers.insert(target.to_string(), mapper.clone());
        Ok(mapper)
    }

    fn resolve_target(&self, target: &str) -> Result<String> {
        let snapshot = self.state.load();
        let resolved =
            if target.is_empty() { snapshot.current_context.clone() } else { target.to_string() };

        if !snapshot.contexts.contains(&resolved) {
            return Err(KubegateError::unknown_target(resolved));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ClusterProvider for KubeconfigClusterProvider {
    async fn targets(&self) -> Result<Vec<String>> {
        Ok(self.state.load().contexts.clone())
    }

    fn default_target(&self) -> String {
        self.state.load().current_context.clone()
    }

    fn target_parameter_name(&self) -> &'static str {
        TARGET_PARAMETER_NAME
    }

    async fn derived_client(&self, target: &str, bearer: Option<&str>) -> Result<kube::Client> {
        let target = self.resolve_target(target)?;
        let kube_config = self.kube_config_for(&target).await?;
        let mapper = self.mapper_for(&target, &kube_config)?;
        build_derived_client(kube_config, bearer, self.rules.clone(), mapper)
    }

    async fn is_openshift(&self) -> bool {
        let default_target = self.default_target();
        let Ok(kube_config) = self.kube_config_for(&default_target).await else {
            return false;
        };
        let Ok(client) = build_plain_client(kube_config) else {
            return false;
        };
        capture_state(&client).await.is_openshift
    }

    async fn watch_targets(&self, callback: ReloadCallback) {
        let mut watchers = self.watchers.lock().await;

        for watcher in watchers.cluster.drain(..) {
            watcher.close().await;
        }
        if let Some(watcher) = watchers.file.take() {
            watcher.close().await;
        }

        // One cluster-state watcher per target
        let targets = self.state.load().contexts.clone();
        for target in targets {
            let kube_config = match self.kube_config_for(&target).await {
                Ok(config) => config,
                Err(e) => {
                    warn!(target = %target, error = %e, "skipping cluster watcher for target");
                    continue;
                }
            };
            let mapper = self.mapper_for(&target, &kube_config).ok();
            let client = match build_plain_client(kube_config) {
                Ok(client) => client,
                Err(e) => {
                    warn!(target = %target, error = %e, "skipping cluster watcher for target");
                    continue;
                }
            };
            let watcher = Arc::new(ClusterStateWatcher::new(client, mapper));
            watcher.watch(callback.clone());
            watchers.cluster.push(watcher);
        }

        // One file watcher re-reading the kubeconfig before reloading
        let path = self.path.clone();
        let state = self.state.clone();
        let mappers = self.mappers.clone();
        let reload = callback.clone();
        let file_callback: ReloadCallback = Arc::new(move || {
            let snapshot = load_snapshot(&path)?;
            state.store(Arc::new(snapshot));
            // Context entries may now point at different clusters
            mappers.lock().unwrap().clear();
            reload()
        });

        let file_watcher = Arc::new(KubeconfigWatcher::new(self.path.clone()));
        file_watcher.watch(file_callback);
        watchers.file = Some(file_watcher);
    }

    async fn close(&self) {
        let mut watchers = self.watchers.lock().await;
        for watcher in watchers.cluster.drain(..) {
            watcher.close().await;
        }
        if let Some(watcher) = watchers.file.take() {
            watcher.close().await;
        }
    }

    fn token_exchange(&self) -> Option<&dyn TokenExchangeCapability> {
        Some(self)
    }
}

impl TokenExchangeCapability for KubeconfigClusterProvider {
    fn exchange_config(&self, target: &str) -> Option<&TargetTokenExchangeConfig> {
        self.exchange_configs.get(target)
    }

    fn exchange_strategy(&self) -> &str {
        &self.exchange_strategy
    }
}

/// Default kubeconfig location: the first `KUBECONFIG` entry, falling back
/// to `~/.kube/config`.
fn default_kubeconfig_path() -> PathBuf {
    if let Some(raw) = std::env::var_os("KUBECONFIG") {
        let raw = raw.to_string_lossy();
        if let Some(first) = raw.split(':').find(|p| !p.is_empty()) {
            return PathBuf::from(first);
        }
    }
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(".kube").join("config")
}
