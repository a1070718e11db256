//! # Observability
//!
//! Structured logging for the kubegate server.

pub mod logging;
