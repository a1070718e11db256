//! Server bootstrap.
//!
//! Builds the OIDC provider and the shared HTTP client, constructs the
//! MCP server, installs the SIGHUP reload handler, and runs the selected
//! transport until shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::auth::OidcProvider;
use crate::config::{self, StaticConfig};
use crate::errors::{KubegateError, Result};
use crate::mcp::http;
use crate::mcp::server::McpServer;
use crate::mcp::stdio::McpStdioServer;

/// Run the server with the given configuration.
pub async fn run(
    config: StaticConfig,
    config_path: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<()> {
    let http_client = build_http_client(&config)?;

    let oidc = if config.authorization_url.is_empty() {
        None
    } else {
        let provider = OidcProvider::discover(&config.authorization_url, &http_client).await?;
        info!(issuer = %provider.issuer(), "OIDC provider resolved");
        Some(Arc::new(provider))
    };

    let stdio_transport = config.port.is_empty();
    let server = McpServer::new(config).await?;

    if config_path.is_some() || config_dir.is_some() {
        spawn_sighup_handler(server.clone(), config_path, config_dir);
    }

    if stdio_transport {
        McpStdioServer::new(server.clone()).run().await?;
    } else {
        http::serve(server.clone(), oidc, http_client).await?;
    }

    server.close().await;
    Ok(())
}

/// Shared HTTP client for OIDC discovery and the well-known reverse
/// proxy, trusting the configured certificate authority when present.
fn build_http_client(config: &StaticConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));

    let ca_path = config.certificate_authority.trim();
    if !ca_path.is_empty() {
        let pem = std::fs::read(ca_path).map_err(|e| KubegateError::Io {
            source: e,
            context: format!("failed to read CA certificate from {}", ca_path),
        })?;
        let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            KubegateError::config(format!(
                "failed to parse CA certificate from {}: {}",
                ca_path, e
            ))
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    builder
        .build()
        .map_err(|e| KubegateError::config(format!("failed to build HTTP client: {}", e)))
}

/// Reload the configuration from disk on SIGHUP. A failed reload leaves
/// the running state untouched.
fn spawn_sighup_handler(
    server: Arc<McpServer>,
    config_path: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) {
    tokio::spawn(async move {
        let mut sighup =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(signal) => signal,
                Err(e) => {
                    error!(error = %e, "unable to install SIGHUP handler");
                    return;
                }
            };

        while sighup.recv().await.is_some() {
            info!("Received SIGHUP signal, reloading configuration");

            let reloaded = match config::load(config_path.as_deref(), config_dir.as_deref()) {
                Ok(new_config) => server.reload_configuration(new_config).await,
                Err(e) => Err(e),
            };

            match reloaded {
                Ok(()) => info!("Configuration reloaded successfully via SIGHUP"),
                Err(e) => error!(error = %e, "Failed to reload configuration"),
            }
        }
    });
}
