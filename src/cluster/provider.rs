//! Target provider abstraction.
//!
//! A provider resolves the set of cluster targets, hands out derived
//! clients pinned to a target, and arms the background watchers that drive
//! catalog reloads.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cluster::kubeconfig::KubeconfigClusterProvider;
use crate::cluster::single::SingleClusterProvider;
use crate::config::{ClusterProviderStrategy, StaticConfig};
use crate::errors::Result;
use crate::tokenexchange::TargetTokenExchangeConfig;

pub use crate::watch::ReloadCallback;

/// Parameter name injected into tool schemas by multi-cluster providers.
pub const TARGET_PARAMETER_NAME: &str = "context";

/// A provider of cluster targets and derived clients.
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// The current target set. Single-cluster providers report a single
    /// empty-string target.
    async fn targets(&self) -> Result<Vec<String>>;

    /// The target used when a tool call does not name one.
    fn default_target(&self) -> String;

    /// Name of the target parameter in tool schemas; empty when targets
    /// are not selectable.
    fn target_parameter_name(&self) -> &'static str;

    /// A Kubernetes client pinned to the given target, wrapped by the
    /// access-control transport and carrying the caller's credential when
    /// present.
    async fn derived_client(&self, target: &str, bearer: Option<&str>) -> Result<kube::Client>;

    /// Whether the default target is an OpenShift cluster, detected by the
    /// presence of the `project.openshift.io` API group.
    async fn is_openshift(&self) -> bool;

    /// Arm the background watchers; each detected change invokes the
    /// callback. Replaces any previously armed watchers.
    async fn watch_targets(&self, callback: ReloadCallback);

    /// Stop all watchers deterministically.
    async fn close(&self);

    /// Optional capability: per-target token exchange configuration.
    fn token_exchange(&self) -> Option<&dyn TokenExchangeCapability> {
        None
    }
}

/// Optional provider capability exposing per-target token exchange
/// configuration. When `exchange_config` returns a config for a target,
/// the exchange runs before the derived client is constructed and the
/// exchanged token replaces the caller's original credential.
pub trait TokenExchangeCapability: Send + Sync {
    fn exchange_config(&self, target: &str) -> Option<&TargetTokenExchangeConfig>;
    fn exchange_strategy(&self) -> &str;
}

/// Construct the provider selected by the configuration strategy.
pub async fn new_provider(config: &StaticConfig) -> Result<Arc<dyn ClusterProvider>> {
    match resolve_strategy(config) {
        ClusterProviderStrategy::Kubeconfig => {
            Ok(Arc::new(KubeconfigClusterProvider::new(config).await?))
        }
        strategy => Ok(Arc::new(SingleClusterProvider::new(config, strategy).await?)),
    }
}

/// Resolve the runtime strategy: explicit configuration wins, then a
/// kubeconfig path, then in-cluster detection, then kubeconfig defaults.
pub(crate) fn resolve_strategy(config: &StaticConfig) -> ClusterProviderStrategy {
    if config.cluster_provider_strategy != ClusterProviderStrategy::Auto {
        return config.cluster_provider_strategy;
    }

    if !config.kubeconfig.is_empty() {
        return ClusterProviderStrategy::Kubeconfig;
    }

    if in_cluster_detected() {
        return ClusterProviderStrategy::InCluster;
    }

    ClusterProviderStrategy::Kubeconfig
}

/// In-cluster detection through the service environment injected into
/// every pod.
pub(crate) fn in_cluster_detected() -> bool {
    std::env::var_os("KUBERNETES_SERVICE_HOST").is_some_and(|v| !v.is_empty())
        && std::env::var_os("KUBERNETES_SERVICE_PORT").is_some_and(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_strategy_wins() {
        let config = StaticConfig {
            cluster_provider_strategy: ClusterProviderStrategy::Disabled,
            kubeconfig: "/some/kubeconfig".to_string(),
            ..Default::default()
        };
        assert_eq!(resolve_strategy(&config), ClusterProviderStrategy::Disabled);
    }

    #[test]
    fn test_kubeconfig_path_selects_kubeconfig_strategy() {
        let config = StaticConfig {
            kubeconfig: "/some/kubeconfig".to_string(),
            ..Default::default()
        };
        assert_eq!(resolve_strategy(&config), ClusterProviderStrategy::Kubeconfig);
    }

    #[test]
    fn test_in_cluster_detection_and_auto_fallback() {
        // One test body: these cases share process-wide environment state.
        std::env::remove_var("KUBERNETES_SERVICE_HOST");
        std::env::remove_var("KUBERNETES_SERVICE_PORT");
        assert!(!in_cluster_detected());
        assert_eq!(
            resolve_strategy(&StaticConfig::default()),
            ClusterProviderStrategy::Kubeconfig
        );

        std::env::set_var("KUBERNETES_SERVICE_HOST", "10.0.0.1");
        std::env::set_var("KUBERNETES_SERVICE_PORT", "443");
        assert!(in_cluster_detected());
        assert_eq!(
            resolve_strategy(&StaticConfig::default()),
            ClusterProviderStrategy::InCluster
        );

        std::env::remove_var("KUBERNETES_SERVICE_HOST");
        std::env::remove_var("KUBERNETES_SERVICE_PORT");
    }
}
