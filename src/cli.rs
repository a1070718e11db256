//! # Command Line Interface
//!
//! Flags mirror the configuration keys; a flag passed explicitly overrides
//! the value loaded from the configuration files.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{self, ClusterProviderStrategy, StaticConfig};
use crate::errors::Result;
use crate::{output, startup, toolsets};

#[derive(Parser, Debug, Default)]
#[command(name = "kubegate")]
#[command(about = "Kubernetes Model Context Protocol (MCP) server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path of the config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the drop-in configuration directory (files loaded in
    /// lexical order). Defaults to conf.d next to the config file.
    #[arg(long = "config-dir")]
    pub config_dir: Option<PathBuf>,

    /// Start a streamable HTTP and SSE server on the specified port
    /// (stdio transport when omitted)
    #[arg(long)]
    pub port: Option<String>,

    /// SSE public base URL to use when sending the endpoint message
    #[arg(long = "sse-base-url")]
    pub sse_base_url: Option<String>,

    /// Path to the kubeconfig file to use for authentication
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Comma-separated list of toolsets to enable
    #[arg(long, value_delimiter = ',')]
    pub toolsets: Option<Vec<String>>,

    /// Output format for resource list operations
    #[arg(long = "list-output")]
    pub list_output: Option<String>,

    /// Only expose tools annotated as read-only
    #[arg(long = "read-only")]
    pub read_only: bool,

    /// Hide tools annotated as destructive
    #[arg(long = "disable-destructive")]
    pub disable_destructive: bool,

    /// Run in stateless mode (disables tool/prompt change notifications)
    #[arg(long)]
    pub stateless: bool,

    /// Require OAuth authorization on the HTTP transport. Ignored for the
    /// stdio transport.
    #[arg(long = "require-oauth", hide = true)]
    pub require_oauth: bool,

    /// OAuth audience for token claims validation
    #[arg(long = "oauth-audience", hide = true)]
    pub oauth_audience: Option<String>,

    /// OAuth authorization server URL for the protected resource endpoints
    #[arg(long = "authorization-url", hide = true)]
    pub authorization_url: Option<String>,

    /// Public URL of this server
    #[arg(long = "server-url", hide = true)]
    pub server_url: Option<String>,

    /// Certificate authority bundle used to verify the authorization
    /// server
    #[arg(long = "certificate-authority", hide = true)]
    pub certificate_authority: Option<String>,

    /// Disable multi-cluster tools; everything runs against the default
    /// context
    #[arg(long = "disable-multi-cluster")]
    pub disable_multi_cluster: bool,

    /// Log verbosity (0-9)
    #[arg(long = "log-level")]
    pub log_level: Option<i32>,
}

impl Cli {
    /// Overlay explicitly passed flags onto the loaded configuration.
    pub fn apply_flags(&self, config: &mut StaticConfig) {
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(sse_base_url) = &self.sse_base_url {
            config.sse_base_url = sse_base_url.clone();
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            config.kubeconfig = kubeconfig.clone();
        }
        if let Some(toolsets) = &self.toolsets {
            config.toolsets = toolsets.clone();
        }
        if let Some(list_output) = &self.list_output {
            config.list_output = list_output.clone();
        }
        if self.read_only {
            config.read_only = true;
        }
        if self.disable_destructive {
            config.disable_destructive = true;
        }
        if self.stateless {
            config.stateless = true;
        }
        if self.require_oauth {
            config.require_oauth = true;
        }
        if let Some(oauth_audience) = &self.oauth_audience {
            config.oauth_audience = oauth_audience.clone();
        }
        if let Some(authorization_url) = &self.authorization_url {
            config.authorization_url = authorization_url.clone();
        }
        if let Some(server_url) = &self.server_url {
            config.server_url = server_url.clone();
        }
        if let Some(certificate_authority) = &self.certificate_authority {
            config.certificate_authority = certificate_authority.clone();
        }
        if self.disable_multi_cluster {
            config.cluster_provider_strategy = ClusterProviderStrategy::Disabled;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
    }
}

/// Parse the command line, assemble the configuration, and run the
/// server.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.is_some() || cli.config_dir.is_some() {
        config::load(cli.config.as_deref(), cli.config_dir.as_deref())?
    } else {
        StaticConfig::default()
    };

    cli.apply_flags(&mut config);

    // OAuth is not a meaningful flow for the stdio transport
    if config.require_oauth && config.port.is_empty() {
        config.require_oauth = false;
    }

    crate::observability::logging::init(config.log_level, config.port.is_empty())?;

    config.validate()?;

    tracing::info!(
        toolsets = %config.toolsets.join(","),
        list_output = %config.list_output,
        read_only = config.read_only,
        disable_destructive = config.disable_destructive,
        stateless = config.stateless,
        cluster_provider_strategy = %config.cluster_provider_strategy.as_str(),
        available_toolsets = %toolsets::names().join(","),
        available_outputs = %output::NAMES.join(","),
        "Starting kubegate"
    );

    startup::run(config, cli.config, cli.config_dir).await
}
