//! # Kubegate
//!
//! Kubegate is a Model Context Protocol (MCP) server that exposes one or
//! many Kubernetes clusters as a set of tools callable by a model-driven
//! client. Tool invocations are translated into Kubernetes API
//! operations, the caller's identity is propagated to every downstream
//! request, and the advertised tool catalog adapts to the live state of
//! the target clusters.
//!
//! ## Architecture
//!
//! ```text
//! MCP Transports (stdio / streamable HTTP / SSE)
//!      ↓
//! Request Pipeline → Target Provider → Derived Kubernetes Client
//!      ↓                  ↓                    ↓
//! Authorization     Background Watchers   Access-Control Transport
//! ```
//!
//! ## Core Components
//!
//! - **Target provider**: single-cluster or kubeconfig-backed
//!   multi-cluster targeting with live watchers
//! - **Tool/prompt reconciler**: diffs the applicable catalog on every
//!   reload and emits list-changed notifications
//! - **Identity pipeline**: per-request bearer propagation with optional
//!   OAuth token exchange per target
//! - **Access-control transport**: denied resources are rejected before
//!   any request reaches the wire

pub mod auth;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod errors;
pub mod mcp;
pub mod observability;
pub mod output;
pub mod prompts;
pub mod startup;
pub mod tokenexchange;
pub mod toolsets;
pub mod watch;

// Re-export commonly used types
pub use config::StaticConfig;
pub use errors::{KubegateError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
