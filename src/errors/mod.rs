//! # Error Handling
//!
//! Central error types for the kubegate MCP server.

mod types;

pub use types::{AuthErrorType, KubegateError, Result};
