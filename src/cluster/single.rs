//! Single-cluster target provider.
//!
//! Serves the in-cluster and disabled-multi-cluster strategies: one
//! anonymous target addressed by the empty string, no target parameter in
//! tool schemas.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::cluster::client::{build_derived_client, build_plain_client};
use crate::cluster::provider::{ClusterProvider, ReloadCallback};
use crate::cluster::RestMapper;
use crate::config::{ClusterProviderStrategy, GvkRule, StaticConfig};
use crate::errors::{KubegateError, Result};
use crate::watch::cluster_state::capture_state;
use crate::watch::ClusterStateWatcher;

/// Provider pinned to exactly one cluster.
pub struct SingleClusterProvider {
    kube_config: kube::Config,
    rules: Arc<Vec<GvkRule>>,
    mapper: Arc<RestMapper>,
    plain_client: kube::Client,
    watcher: Mutex<Option<Arc<ClusterStateWatcher>>>,
}

impl SingleClusterProvider {
    pub async fn new(
        config: &StaticConfig,
        strategy: ClusterProviderStrategy,
    ) -> Result<Self> {
        let kube_config = match strategy {
            ClusterProviderStrategy::InCluster => kube::Config::incluster().map_err(|e| {
                KubegateError::config_with_source(
                    "in-cluster configuration unavailable",
                    Box::new(e),
                )
            })?,
            _ => kube::Config::infer().await.map_err(|e| {
                KubegateError::config_with_source(
                    "unable to infer Kubernetes configuration",
                    Box::new(e),
                )
            })?,
        };

        let plain_client = build_plain_client(kube_config.clone())?;
        let mapper = Arc::new(RestMapper::new(plain_client.clone()));

        Ok(Self {
            kube_config,
            rules: Arc::new(config.denied_resources.clone()),
            mapper,
            plain_client,
            watcher: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ClusterProvider for SingleClusterProvider {
    async fn targets(&self) -> Result<Vec<String>> {
        Ok(vec![String::new()])
    }

    fn default_target(&self) -> String {
        String::new()
    }

    fn target_parameter_name(&self) -> &'static str {
        ""
    }

    async fn derived_client(&self, target: &str, bearer: Option<&str>) -> Result<kube::Client> {
        if !target.is_empty() {
            return Err(KubegateError::unknown_target(target));
        }
        build_derived_client(
            self.kube_config.clone(),
            bearer,
            self.rules.clone(),
            self.mapper.clone(),
        )
    }

    async fn is_openshift(&self) -> bool {
        capture_state(&self.plain_client).await.is_openshift
    }

    async fn watch_targets(&self, callback: ReloadCallback) {
        let mut guard = self.watcher.lock().await;
        if let Some(previous) = guard.take() {
            previous.close().await;
        }

        let watcher = Arc::new(ClusterStateWatcher::new(
            self.plain_client.clone(),
            Some(self.mapper.clone()),
        ));
        watcher.watch(callback);
        *guard = Some(watcher);
    }

    async fn close(&self) {
        if let Some(watcher) = self.watcher.lock().await.take() {
            watcher.close().await;
        }
    }
}
