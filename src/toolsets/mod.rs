//! # Toolsets
//!
//! Named bundles of tools contributed to the catalog as a unit. The
//! registry is built once at startup; configuration enables toolsets by
//! name.

pub mod config_view;
pub mod core;
pub mod helm;

use std::future::Future;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::errors::{KubegateError, Result};
use crate::mcp::catalog::{ServerPrompt, ServerTool, ToolHandler, ToolHandlerParams};
use crate::mcp::protocol::{Tool, ToolAnnotations};

/// Name of the target-listing tool, hidden when only one target exists.
pub const CONTEXTS_LIST_TOOL: &str = "contexts_list";

/// A named, versioned bundle of tools and embedded prompts.
pub trait Toolset: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn tools(&self) -> Vec<ServerTool>;
    fn prompts(&self) -> Vec<ServerPrompt> {
        Vec::new()
    }
}

static REGISTRY: Lazy<Vec<Arc<dyn Toolset>>> = Lazy::new(|| {
    vec![
        Arc::new(core::CoreToolset),
        Arc::new(config_view::ConfigToolset),
        Arc::new(helm::HelmToolset),
    ]
});

/// Names of all registered toolsets.
pub fn names() -> Vec<&'static str> {
    REGISTRY.iter().map(|t| t.name()).collect()
}

/// Look up a registered toolset.
pub fn by_name(name: &str) -> Option<Arc<dyn Toolset>> {
    REGISTRY.iter().find(|t| t.name() == name).cloned()
}

/// Validate that every name refers to a registered toolset.
pub fn validate(requested: &[String]) -> Result<()> {
    for name in requested {
        if by_name(name).is_none() {
            return Err(KubegateError::validation(format!(
                "invalid toolset name: {}, valid names are: {}",
                name,
                names().join(", ")
            )));
        }
    }
    Ok(())
}

/// Wrap an async function as a boxed tool handler.
pub(crate) fn handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(ToolHandlerParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    Arc::new(move |params| Box::pin(f(params)))
}

/// Annotations for a read-only, idempotent tool.
pub(crate) fn read_only_annotations(title: &str) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.to_string()),
        read_only_hint: Some(true),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(false),
    }
}

/// Annotations for a destructive tool.
pub(crate) fn destructive_annotations(title: &str, idempotent: bool) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.to_string()),
        read_only_hint: Some(false),
        destructive_hint: Some(true),
        idempotent_hint: Some(idempotent),
        open_world_hint: Some(false),
    }
}

/// Assemble a tool definition.
pub(crate) fn tool(
    name: &str,
    description: &str,
    input_schema: serde_json::Value,
    annotations: ToolAnnotations,
    tool_handler: ToolHandler,
) -> ServerTool {
    ServerTool {
        tool: Tool {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            annotations: Some(annotations),
        },
        handler: tool_handler,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        let registered = names();
        assert!(registered.contains(&"core"));
        assert!(registered.contains(&"config"));
        assert!(registered.contains(&"helm"));
    }

    #[test]
    fn test_validate_rejects_unknown_names() {
        assert!(validate(&["core".to_string(), "helm".to_string()]).is_ok());
        let err = validate(&["nonexistent".to_string()]).unwrap_err();
        assert!(err.to_string().contains("invalid toolset name"));
    }

    #[test]
    fn test_core_toolset_contains_contexts_list() {
        let core = by_name("core").unwrap();
        let tool_names: Vec<String> =
            core.tools().iter().map(|t| t.tool.name.clone()).collect();
        assert!(tool_names.contains(&CONTEXTS_LIST_TOOL.to_string()));
        assert!(tool_names.contains(&"pods_list".to_string()));
    }

    #[test]
    fn test_helm_toolset_marks_uninstall_destructive() {
        let helm = by_name("helm").unwrap();
        let uninstall =
            helm.tools().into_iter().find(|t| t.tool.name == "helm_uninstall").unwrap();
        assert!(uninstall.tool.destructive());

        let list = helm.tools().into_iter().find(|t| t.tool.name == "helm_list").unwrap();
        assert!(list.tool.read_only());
    }
}
