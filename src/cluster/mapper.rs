//! Cached discovery mapper resolving resource plurals to kinds.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::cluster::access_control::ResourceResolver;
use crate::errors::{KubegateError, Result};

/// Resource-to-kind mapper backed by the Kubernetes discovery API.
///
/// The full discovery document is fetched on the first miss and cached;
/// `invalidate` drops the cache so the next lookup re-runs discovery. The
/// mapper holds its own plain client so lookups never recurse through the
/// access-controlled transport they serve.
pub struct RestMapper {
    client: kube::Client,
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl RestMapper {
    pub fn new(client: kube::Client) -> Self {
        Self { client, cache: RwLock::new(None) }
    }

    /// Drop the cached discovery document.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn cached_kind(&self, key: &str) -> Option<String> {
        self.cache.read().await.as_ref().and_then(|map| map.get(key).cloned())
    }

    async fn refresh(&self) -> Result<()> {
        let discovery =
            kube::Discovery::new(self.client.clone()).run().await.map_err(|e| {
                KubegateError::Discovery {
                    message: "unable to run API discovery".to_string(),
                    source: Some(Box::new(e)),
                }
            })?;

        let mut map = HashMap::new();
        for api_group in discovery.groups() {
            for version in api_group.versions() {
                for (resource, _capabilities) in api_group.versioned_resources(version) {
                    map.insert(
                        cache_key(&resource.group, &resource.version, &resource.plural),
                        resource.kind.clone(),
                    );
                }
            }
        }

        *self.cache.write().await = Some(map);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceResolver for RestMapper {
    async fn kind_for(&self, group: &str, version: &str, resource: &str) -> Result<String> {
        let key = cache_key(group, version, resource);

        if let Some(kind) = self.cached_kind(&key).await {
            return Ok(kind);
        }

        self.refresh().await?;

        self.cached_kind(&key).await.ok_or_else(|| {
            KubegateError::discovery(format!(
                "no kind registered for resource \"{}\" in {}/{}",
                resource, group, version
            ))
        })
    }
}

fn cache_key(group: &str, version: &str, resource: &str) -> String {
    format!("{}/{}/{}", group, version, resource)
}
