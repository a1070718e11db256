//! MCP server state and the tool/prompt reconciler.
//!
//! The server owns the configuration, the target provider, and the
//! advertised catalog, all published through atomic pointer swaps so
//! request handlers never observe a partially applied reload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::cluster::{self, ClusterProvider, ReloadCallback};
use crate::config::StaticConfig;
use crate::errors::Result;
use crate::mcp::catalog::{Catalog, ServerTool};
use crate::mcp::notifications::{Notification, NotificationBroadcaster};
use crate::mcp::protocol::Tool;
use crate::prompts;
use crate::toolsets;

/// The MCP server runtime state.
pub struct McpServer {
    config: Arc<ArcSwap<StaticConfig>>,
    provider: RwLock<Arc<dyn ClusterProvider>>,
    catalog: ArcSwap<Catalog>,
    notifications: NotificationBroadcaster,
    reconcile_lock: Mutex<()>,
    reconcile_pending: AtomicBool,
    reload_tx: mpsc::UnboundedSender<()>,
}

impl McpServer {
    /// Construct the server: build the provider, run the initial
    /// reconciliation, and arm the watchers.
    pub async fn new(config: StaticConfig) -> Result<Arc<Self>> {
        let provider = cluster::new_provider(&config).await?;

        let (reload_tx, mut reload_rx) = mpsc::unbounded_channel::<()>();

        let server = Arc::new(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            provider: RwLock::new(provider),
            catalog: ArcSwap::from_pointee(Catalog::default()),
            notifications: NotificationBroadcaster::new(),
            reconcile_lock: Mutex::new(()),
            reconcile_pending: AtomicBool::new(false),
            reload_tx,
        });

        // Watcher callbacks are synchronous; they poke this task, which
        // performs the actual (async) reconciliation.
        let reload_server = server.clone();
        tokio::spawn(async move {
            while reload_rx.recv().await.is_some() {
                if let Err(e) = reload_server.reconcile().await {
                    warn!(error = %e, "watcher-triggered reconciliation failed");
                }
            }
        });

        // The initial reconciliation also arms the watchers.
        server.reconcile().await?;

        Ok(server)
    }

    /// The callback handed to watchers; idempotent and cheap.
    pub fn reload_callback(&self) -> ReloadCallback {
        let tx = self.reload_tx.clone();
        Arc::new(move || {
            let _ = tx.send(());
            Ok(())
        })
    }

    pub fn config(&self) -> Arc<StaticConfig> {
        self.config.load_full()
    }

    /// Shared handle for the authorization middleware.
    pub fn config_cell(&self) -> Arc<ArcSwap<StaticConfig>> {
        self.config.clone()
    }

    pub fn provider(&self) -> Arc<dyn ClusterProvider> {
        self.provider.read().expect("provider lock poisoned").clone()
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.load_full()
    }

    /// Names of the currently advertised tools.
    pub fn enabled_tools(&self) -> Vec<String> {
        self.catalog.load().tool_names()
    }

    /// Names of the currently advertised prompts.
    pub fn enabled_prompts(&self) -> Vec<String> {
        self.catalog.load().prompt_names()
    }

    pub fn subscribe_notifications(
        &self,
    ) -> tokio::sync::broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Recompute the applicable catalog and publish it. Serialized;
    /// requests arriving during an active run coalesce into exactly one
    /// follow-up run.
    pub async fn reconcile(&self) -> Result<()> {
        let _guard = match self.reconcile_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.reconcile_pending.store(true, Ordering::SeqCst);
                return Ok(());
            }
        };

        loop {
            self.reconcile_once().await?;
            if !self.reconcile_pending.swap(false, Ordering::SeqCst) {
                break;
            }
        }

        // A changed target set may require a different watcher set.
        self.provider().watch_targets(self.reload_callback()).await;
        Ok(())
    }

    async fn reconcile_once(&self) -> Result<()> {
        let config = self.config.load_full();
        let provider = self.provider();

        let next = build_catalog(&config, provider.as_ref()).await?;

        let current = self.catalog.load_full();
        let diff = current.diff(&next);
        if diff.is_empty() {
            debug!("reconciliation produced no catalog change");
            return Ok(());
        }

        info!(
            removed_tools = diff.removed_tools.len(),
            added_tools = diff.added_tools.len(),
            removed_prompts = diff.removed_prompts.len(),
            added_prompts = diff.added_prompts.len(),
            "publishing reconciled catalog"
        );
        self.catalog.store(Arc::new(next));

        if !config.stateless {
            // Removal notifications precede addition notifications so a
            // consumer replaying the stream sees a monotonic transition.
            if diff.tools_changed() {
                self.notifications.send(Notification::tools_list_changed());
            }
            if diff.prompts_changed() {
                self.notifications.send(Notification::prompts_list_changed());
            }
        }

        Ok(())
    }

    /// Apply a freshly loaded configuration. The candidate provider and
    /// catalog are both built before anything is committed; any failure
    /// leaves the previous configuration, catalog, and provider in effect.
    pub async fn reload_configuration(&self, new_config: StaticConfig) -> Result<()> {
        // Serialized with watcher-triggered reconciliations; a SIGHUP
        // arriving during an active run queues behind it.
        let _guard = self.reconcile_lock.lock().await;

        info!("Reloading MCP server configuration");
        new_config.validate()?;

        let new_provider = cluster::new_provider(&new_config).await?;
        let next = build_catalog(&new_config, new_provider.as_ref()).await?;

        // Commit point: from here on the new state is published.
        let old_provider = {
            let mut provider = self.provider.write().expect("provider lock poisoned");
            std::mem::replace(&mut *provider, new_provider.clone())
        };
        old_provider.close().await;

        let stateless = new_config.stateless;
        self.config.store(Arc::new(new_config));

        let current = self.catalog.load_full();
        let diff = current.diff(&next);
        self.catalog.store(Arc::new(next));

        if !stateless && !diff.is_empty() {
            if diff.tools_changed() {
                self.notifications.send(Notification::tools_list_changed());
            }
            if diff.prompts_changed() {
                self.notifications.send(Notification::prompts_list_changed());
            }
        }

        new_provider.watch_targets(self.reload_callback()).await;

        info!("MCP server configuration reloaded successfully");
        Ok(())
    }

    /// Stop watchers and background work.
    pub async fn close(&self) {
        self.provider().close().await;
    }
}

/// Compute the applicable catalog for the given configuration and
/// provider snapshot.
pub(crate) async fn build_catalog(
    config: &StaticConfig,
    provider: &dyn ClusterProvider,
) -> Result<Catalog> {
    let targets = provider.targets().await?;
    let default_target = provider.default_target();
    let parameter_name = provider.target_parameter_name();
    let multi_target = !parameter_name.is_empty() && targets.len() > 1;

    let mut tools: Vec<ServerTool> = Vec::new();
    for toolset_name in &config.toolsets {
        let Some(toolset) = toolsets::by_name(toolset_name) else {
            // Validated at load time; a vanished toolset is a bug upstream
            continue;
        };
        for mut server_tool in toolset.tools() {
            if multi_target {
                inject_target_parameter(
                    &mut server_tool.tool,
                    parameter_name,
                    &targets,
                    &default_target,
                );
            }
            if !is_tool_applicable(config, &server_tool.tool) {
                continue;
            }
            // The target-listing tool is meaningless with a single target
            if server_tool.tool.name == toolsets::CONTEXTS_LIST_TOOL && !multi_target {
                continue;
            }
            tools.push(server_tool);
        }
    }

    let mut embedded_prompts = Vec::new();
    for toolset_name in &config.toolsets {
        if let Some(toolset) = toolsets::by_name(toolset_name) {
            embedded_prompts.extend(toolset.prompts());
        }
    }
    let declared = prompts::from_definitions(&config.prompts);
    let merged_prompts = prompts::merge_prompts(embedded_prompts, declared);

    Ok(Catalog::new(tools, merged_prompts))
}

/// Composite applicability filter: read-only policy, destructive policy,
/// allowlist, denylist.
fn is_tool_applicable(config: &StaticConfig, tool: &Tool) -> bool {
    if config.read_only && !tool.read_only() {
        return false;
    }
    if config.disable_destructive && tool.destructive() {
        return false;
    }
    if let Some(enabled) = &config.enabled_tools {
        if !enabled.contains(&tool.name) {
            return false;
        }
    }
    if let Some(disabled) = &config.disabled_tools {
        if disabled.contains(&tool.name) {
            return false;
        }
    }
    true
}

/// Prepend the required target parameter to a tool's input schema, with an
/// enum constrained to the current target set.
fn inject_target_parameter(
    tool: &mut Tool,
    parameter_name: &str,
    targets: &[String],
    default_target: &str,
) {
    let schema = tool.input_schema.as_object_mut();
    let Some(schema) = schema else {
        return;
    };

    let Some(properties) = schema
        .entry("properties")
        .or_insert_with(|| serde_json::json!({}))
        .as_object_mut()
    else {
        return;
    };

    properties.insert(
        parameter_name.to_string(),
        serde_json::json!({
            "type": "string",
            "enum": targets,
            "description": format!(
                "Kubernetes context to run the operation against (defaults to {})",
                default_target
            ),
        }),
    );

    let Some(required) = schema
        .entry("required")
        .or_insert_with(|| serde_json::json!([]))
        .as_array_mut()
    else {
        return;
    };
    let already_required = required.iter().any(|v| v.as_str() == Some(parameter_name));
    if !already_required {
        required.insert(0, serde_json::Value::String(parameter_name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_with(annotations: Option<crate::mcp::protocol::ToolAnnotations>) -> Tool {
        Tool {
            name: "sample".to_string(),
            description: "sample".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
            annotations,
        }
    }

    fn read_only_tool() -> Tool {
        tool_with(Some(crate::mcp::protocol::ToolAnnotations {
            read_only_hint: Some(true),
            ..Default::default()
        }))
    }

    fn destructive_tool() -> Tool {
        tool_with(Some(crate::mcp::protocol::ToolAnnotations {
            destructive_hint: Some(true),
            ..Default::default()
        }))
    }

    #[test]
    fn test_read_only_policy_filters_writable_tools() {
        let config = StaticConfig { read_only: true, ..Default::default() };
        assert!(is_tool_applicable(&config, &read_only_tool()));
        assert!(!is_tool_applicable(&config, &tool_with(None)));
    }

    #[test]
    fn test_destructive_policy_filters_destructive_tools() {
        let config = StaticConfig { disable_destructive: true, ..Default::default() };
        assert!(!is_tool_applicable(&config, &destructive_tool()));
        assert!(is_tool_applicable(&config, &tool_with(None)));
    }

    #[test]
    fn test_allowlist_and_denylist() {
        let config = StaticConfig {
            enabled_tools: Some(vec!["sample".to_string()]),
            ..Default::default()
        };
        assert!(is_tool_applicable(&config, &tool_with(None)));

        let config = StaticConfig {
            enabled_tools: Some(vec!["other".to_string()]),
            ..Default::default()
        };
        assert!(!is_tool_applicable(&config, &tool_with(None)));

        let config = StaticConfig {
            disabled_tools: Some(vec!["sample".to_string()]),
            ..Default::default()
        };
        assert!(!is_tool_applicable(&config, &tool_with(None)));
    }

    #[test]
    fn test_inject_target_parameter() {
        let mut tool = tool_with(None);
        let targets = vec!["context-1".to_string(), "context-2".to_string()];
        inject_target_parameter(&mut tool, "context", &targets, "context-1");

        let schema = &tool.input_schema;
        assert_eq!(schema["properties"]["context"]["type"], "string");
        assert_eq!(schema["properties"]["context"]["enum"], json!(["context-1", "context-2"]));
        assert_eq!(schema["required"][0], "context");
    }

    #[test]
    fn test_inject_target_parameter_is_idempotent_on_required() {
        let mut tool = tool_with(None);
        let targets = vec!["a".to_string(), "b".to_string()];
        inject_target_parameter(&mut tool, "context", &targets, "a");
        inject_target_parameter(&mut tool, "context", &targets, "a");

        let required = tool.input_schema["required"].as_array().unwrap();
        assert_eq!(required.iter().filter(|v| v.as_str() == Some("context")).count(), 1);
    }
}
