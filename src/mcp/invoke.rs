//! Per-invocation request pipeline.
//!
//! Target selection, token exchange, derived client construction, and
//! handler dispatch for a single tool call.

use tracing::{debug, warn};

use crate::cluster::ClusterProvider;
use crate::config::StaticConfig;
use crate::mcp::catalog::{ToolCallArgs, ToolHandlerParams};
use crate::mcp::error::McpError;
use crate::mcp::protocol::{ToolCallParams, ToolCallResult};
use crate::mcp::server::McpServer;
use crate::output;
use crate::tokenexchange::{self, TargetTokenExchangeConfig};

/// Per-request caller context. The bearer credential travels here, never
/// in process-wide state, so concurrent requests with different callers do
/// not alias.
#[derive(Clone, Default)]
pub struct CallContext {
    pub bearer: Option<String>,
    pub scopes: Vec<String>,
}

/// Execute a tool call end to end. Handler and transport failures are
/// rendered as error results; only unknown tools and malformed arguments
/// surface as protocol errors.
pub async fn dispatch_tool_call(
    server: &McpServer,
    ctx: &CallContext,
    params: ToolCallParams,
) -> std::result::Result<ToolCallResult, McpError> {
    let catalog = server.catalog();
    let Some(server_tool) = catalog.tool(&params.name) else {
        return Err(McpError::ToolNotFound(params.name));
    };

    let args = ToolCallArgs::from_value(params.arguments)?;

    let provider = server.provider();
    let config = server.config();

    let default_target = provider.default_target();
    let target = args.get_string(provider.target_parameter_name(), &default_target);
    let targets = provider.targets().await.unwrap_or_default();

    let bearer =
        resolve_caller_token(&config, provider.as_ref(), &target, ctx.bearer.as_deref()).await;

    let client = match provider.derived_client(&target, bearer.as_deref()).await {
        Ok(client) => client,
        Err(e) => {
            return Ok(ToolCallResult::text(scrub(e.to_string(), bearer.as_deref()), true));
        }
    };

    let list_output =
        output::from_name(&config.list_output).unwrap_or(output::ListOutput::Table);

    debug!(tool = %server_tool.tool.name, target = %target, "invoking tool handler");

    match (server_tool.handler)(ToolHandlerParams {
        client,
        args,
        list_output,
        targets,
        default_target,
    })
    .await
    {
        Ok(content) => Ok(ToolCallResult::text(content, false)),
        Err(e) => Ok(ToolCallResult::text(scrub(e.to_string(), bearer.as_deref()), true)),
    }
}

/// Determine the credential for the downstream Kubernetes request.
///
/// Per-target exchange configuration wins; the server-wide exchange is the
/// fallback. On exchange failure the original token is retained and the
/// downstream API decides the outcome.
async fn resolve_caller_token(
    config: &StaticConfig,
    provider: &dyn ClusterProvider,
    target: &str,
    bearer: Option<&str>,
) -> Option<String> {
    let bearer = bearer?;

    let (exchange_config, strategy): (Option<&TargetTokenExchangeConfig>, &str) =
        match provider.token_exchange() {
            Some(capability) => match capability.exchange_config(target) {
                Some(per_target) => (Some(per_target), capability.exchange_strategy()),
                None => (config.token_exchange.as_ref(), config.token_exchange_strategy.as_str()),
            },
            None => (config.token_exchange.as_ref(), config.token_exchange_strategy.as_str()),
        };

    let Some(exchange_config) = exchange_config else {
        return Some(bearer.to_string());
    };

    let strategy =
        if strategy.is_empty() { tokenexchange::STRATEGY_RFC8693 } else { strategy };

    let Some(exchanger) = tokenexchange::exchanger(strategy) else {
        warn!(strategy = %strategy, "token exchange strategy not found in registry");
        return Some(bearer.to_string());
    };

    match exchanger.exchange(exchange_config, bearer).await {
        Ok(exchanged) => {
            debug!(target = %target, "token exchanged successfully");
            Some(exchanged.access_token)
        }
        Err(e) => {
            warn!(target = %target, error = %e, "token exchange failed, retaining original token");
            Some(bearer.to_string())
        }
    }
}

/// Remove the caller credential from outward-facing error text.
fn scrub(mut text: String, bearer: Option<&str>) -> String {
    if let Some(bearer) = bearer {
        if !bearer.is_empty() && text.contains(bearer) {
            text = text.replace(bearer, "[redacted]");
        }
    }
    text
}
