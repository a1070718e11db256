//! MCP Request Handler
//!
//! Routes incoming JSON-RPC requests to the appropriate method handlers.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::mcp::error::McpError;
use crate::mcp::invoke::{self, CallContext};
use crate::mcp::protocol::*;
use crate::mcp::server::McpServer;
use crate::prompts;

/// Negotiate the MCP protocol version: the highest version we support that
/// is not newer than the client's.
fn negotiate_version(client_version: &str) -> std::result::Result<String, McpError> {
    SUPPORTED_VERSIONS
        .iter()
        .rev()
        .find(|&&v| v <= client_version)
        .map(|v| v.to_string())
        .ok_or_else(|| McpError::UnsupportedProtocolVersion {
            client: client_version.to_string(),
            supported: SUPPORTED_VERSIONS.iter().map(|s| s.to_string()).collect(),
        })
}

/// Per-connection request handler.
pub struct McpHandler {
    server: Arc<McpServer>,
    ctx: CallContext,
}

impl McpHandler {
    pub fn new(server: Arc<McpServer>, ctx: CallContext) -> Self {
        Self { server, ctx }
    }

    /// Handle an incoming JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let method = request.method.clone();
        let id = request.id.clone();

        debug!(method = %method, id = ?id, "Handling MCP request");

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id.clone(), request.params),
            "ping" => JsonRpcResponse::success(request.id.clone(), serde_json::json!({})),
            "tools/list" => self.handle_tools_list(request.id.clone()),
            "tools/call" => self.handle_tools_call(request.id.clone(), request.params).await,
            "prompts/list" => self.handle_prompts_list(request.id.clone()),
            "prompts/get" => self.handle_prompts_get(request.id.clone(), request.params),
            "notifications/initialized" | "notifications/cancelled" => {
                JsonRpcResponse::success(request.id.clone(), serde_json::json!({}))
            }
            _ => self.method_not_found(request.id.clone(), &request.method),
        };

        debug!(
            method = %method,
            id = ?id,
            has_error = response.error.is_some(),
            "Completed MCP request"
        );

        response
    }

    fn handle_initialize(&self, id: Option<JsonRpcId>, params: Value) -> JsonRpcResponse {
        let params: InitializeParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to parse initialize params");
                return self.error_response(
                    id,
                    McpError::InvalidParams(format!("Failed to parse initialize params: {}", e)),
                );
            }
        };

        let client_version = if params.protocol_version.is_empty() {
            SUPPORTED_VERSIONS[0]
        } else {
            &params.protocol_version
        };

        let negotiated_version = match negotiate_version(client_version) {
            Ok(v) => v,
            Err(e) => {
                error!(client_version = %client_version, error = %e, "Protocol version negotiation failed");
                return self.error_response(id, e);
            }
        };

        let config = self.server.config();
        let list_changed = Some(!config.stateless);

        let result = InitializeResult {
            protocol_version: negotiated_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities { list_changed }),
                prompts: Some(PromptCapabilities { list_changed }),
            },
            server_info: ServerInfo {
                name: crate::APP_NAME.to_string(),
                version: crate::VERSION.to_string(),
            },
            instructions: (!config.server_instructions.is_empty())
                .then(|| config.server_instructions.clone()),
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => self.error_response(id, McpError::SerializationError(e)),
        }
    }

    fn handle_tools_list(&self, id: Option<JsonRpcId>) -> JsonRpcResponse {
        let catalog = self.server.catalog();
        let tools: Vec<Tool> = catalog.tools().iter().map(|t| t.tool.clone()).collect();

        debug!(count = tools.len(), "Listing advertised tools");

        let result = ToolsListResult { tools, next_cursor: None };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => self.error_response(id, McpError::SerializationError(e)),
        }
    }

    async fn handle_tools_call(&self, id: Option<JsonRpcId>, params: Value) -> JsonRpcResponse {
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return self.error_response(
                    id,
                    McpError::InvalidParams(format!("Failed to parse tool call params: {}", e)),
                );
            }
        };

        match invoke::dispatch_tool_call(&self.server, &self.ctx, params).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => self.error_response(id, McpError::SerializationError(e)),
            },
            Err(e) => self.error_response(id, e),
        }
    }

    fn handle_prompts_list(&self, id: Option<JsonRpcId>) -> JsonRpcResponse {
        let catalog = self.server.catalog();
        let prompts: Vec<Prompt> = catalog.prompts().iter().map(|p| p.prompt.clone()).collect();

        let result = PromptsListResult { prompts, next_cursor: None };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => self.error_response(id, McpError::SerializationError(e)),
        }
    }

    fn handle_prompts_get(&self, id: Option<JsonRpcId>, params: Value) -> JsonRpcResponse {
        let params: PromptGetParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return self.error_response(
                    id,
                    McpError::InvalidParams(format!("Failed to parse prompt get params: {}", e)),
                );
            }
        };

        let catalog = self.server.catalog();
        let Some(server_prompt) = catalog.prompt(&params.name) else {
            return self.error_response(id, McpError::PromptNotFound(params.name));
        };

        match prompts::render(server_prompt, params.arguments.as_ref()) {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => self.error_response(id, McpError::SerializationError(e)),
            },
            Err(e) => self.error_response(id, e),
        }
    }

    fn method_not_found(&self, id: Option<JsonRpcId>, method: &str) -> JsonRpcResponse {
        self.error_response(id, McpError::MethodNotFound(method.to_string()))
    }

    fn error_response(&self, id: Option<JsonRpcId>, error: McpError) -> JsonRpcResponse {
        JsonRpcResponse::failure(id, error.to_json_rpc_error())
    }
}
