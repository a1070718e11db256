//! # MCP Server
//!
//! The Model Context Protocol surface: JSON-RPC protocol types, the
//! dynamic tool/prompt catalog, request dispatch, and the stdio, streamable
//! HTTP, and SSE transports.

pub mod catalog;
pub mod error;
pub mod handler;
pub mod http;
pub mod invoke;
pub mod notifications;
pub mod protocol;
pub mod server;
pub mod sse;
pub mod stdio;
pub mod wellknown;

pub use catalog::{Catalog, ServerPrompt, ServerTool, ToolCallArgs, ToolHandlerParams};
pub use error::McpError;
pub use handler::McpHandler;
pub use server::McpServer;
