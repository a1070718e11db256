//! Config toolset: a sanitized view of the effective client
//! configuration.

use serde_json::json;

use crate::errors::{KubegateError, Result};
use crate::mcp::catalog::{ServerTool, ToolHandlerParams};
use crate::toolsets::{handler, read_only_annotations, tool, Toolset};

pub struct ConfigToolset;

impl Toolset for ConfigToolset {
    fn name(&self) -> &'static str {
        "config"
    }

    fn description(&self) -> &'static str {
        "View the effective connection configuration"
    }

    fn tools(&self) -> Vec<ServerTool> {
        vec![tool(
            "configuration_view",
            "Show the targets this server can reach and which one is the default. \
             Credentials are never included.",
            json!({"type": "object", "properties": {}}),
            read_only_annotations("Configuration: View"),
            handler(configuration_view),
        )]
    }
}

async fn configuration_view(params: ToolHandlerParams) -> Result<String> {
    let view = json!({
        "targets": params.targets,
        "default_target": params.default_target,
        "default_namespace": params.client.default_namespace(),
    });
    serde_yaml::to_string(&view)
        .map_err(|e| KubegateError::internal(format!("YAML rendering failed: {}", e)))
}
