//! # Cluster Targeting
//!
//! Target providers abstracting single-cluster and multi-cluster
//! deployments, derived Kubernetes clients, and the access-control
//! transport layer enforcing the denied-resources list.

pub mod access_control;
pub mod client;
pub mod kubeconfig;
pub mod mapper;
pub mod provider;
pub mod single;

pub use access_control::{AccessControlLayer, ResourceResolver};
pub use mapper::RestMapper;
pub use provider::{
    new_provider, ClusterProvider, ReloadCallback, TokenExchangeCapability,
    TARGET_PARAMETER_NAME,
};
