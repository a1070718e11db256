//! MCP Stdio Transport
//!
//! Reads line-framed JSON-RPC messages from stdin and writes responses to
//! stdout. Logging is silenced in this mode so the protocol stream stays
//! clean.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::errors::Result;
use crate::mcp::handler::McpHandler;
use crate::mcp::invoke::CallContext;
use crate::mcp::protocol::{error_codes, JsonRpcError, JsonRpcResponse};
use crate::mcp::server::McpServer;

pub struct McpStdioServer {
    handler: McpHandler,
}

impl McpStdioServer {
    /// Create a stdio transport. The stdio caller has direct machine
    /// access; no bearer credential is attached.
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { handler: McpHandler::new(server, CallContext::default()) }
    }

    /// Run the stdio loop. Exits cleanly on EOF.
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let request = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    let error_response = JsonRpcResponse::failure(
                        None,
                        JsonRpcError {
                            code: error_codes::PARSE_ERROR,
                            message: format!("Parse error: {}", e),
                            data: None,
                        },
                    );
                    write_response(&mut stdout, &error_response).await?;
                    continue;
                }
            };

            let response = self.handler.handle_request(request).await;
            write_response(&mut stdout, &response).await?;
        }

        Ok(())
    }
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> Result<()> {
    let json = serde_json::to_string(response)?;
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
