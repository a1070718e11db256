//! # Configuration Settings
//!
//! Defines the static configuration snapshot for the kubegate server. The
//! live instance is immutable; reloads construct a fresh snapshot and publish
//! it atomically.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{KubegateError, Result};
use crate::output;
use crate::tokenexchange::TargetTokenExchangeConfig;
use crate::toolsets;

/// Cluster provider strategy selecting how targets are discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterProviderStrategy {
    /// Resolve automatically: kubeconfig path wins, then in-cluster detection
    #[default]
    Auto,
    /// Multi-cluster provider backed by a kubeconfig file
    Kubeconfig,
    /// Single-cluster provider using the in-cluster service account
    InCluster,
    /// Single-cluster provider pinned to the default context, multi-cluster
    /// tools disabled
    Disabled,
}

impl ClusterProviderStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterProviderStrategy::Auto => "auto",
            ClusterProviderStrategy::Kubeconfig => "kubeconfig",
            ClusterProviderStrategy::InCluster => "in-cluster",
            ClusterProviderStrategy::Disabled => "disabled",
        }
    }
}

/// A denied-resource rule. An empty field matches any value in that slot;
/// the list is allow-by-default and a single matching rule denies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GvkRule {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GvkRule {
    /// Whether this rule matches the given group/version/kind.
    pub fn matches(&self, group: &str, version: &str, kind: &str) -> bool {
        (self.group.is_empty() || self.group == group)
            && (self.version.is_empty() || self.version == version)
            && (self.kind.is_empty() || self.kind == kind)
    }
}

/// Argument declaration for a user-declared prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptArgumentDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// A single static message of a user-declared prompt. `{{argument}}`
/// placeholders in `content` are interpolated at render time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptMessageDefinition {
    #[serde(default = "default_prompt_role")]
    pub role: String,
    pub content: String,
}

fn default_prompt_role() -> String {
    "user".to_string()
}

/// A user-declared prompt from configuration. Declared prompts override
/// embedded toolset prompts of the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub arguments: Vec<PromptArgumentDefinition>,
    pub messages: Vec<PromptMessageDefinition>,
}

impl Default for PromptDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            description: String::new(),
            arguments: Vec::new(),
            messages: Vec::new(),
        }
    }
}

/// Per-target cluster configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetClusterConfig {
    /// Token exchange configuration for this target, if any.
    pub token_exchange: Option<TargetTokenExchangeConfig>,
}

/// Immutable snapshot of the parsed server configuration.
///
/// Constructed at startup and again on each reload; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct StaticConfig {
    /// HTTP port for the streamable HTTP and SSE transports. Empty selects
    /// the stdio transport.
    pub port: String,

    /// Public base URL advertised in the SSE endpoint event.
    pub sse_base_url: String,

    /// Path to the kubeconfig file used for multi-cluster targeting.
    pub kubeconfig: String,

    /// Enabled toolset names.
    pub toolsets: Vec<String>,

    /// Output format name for resource list operations.
    pub list_output: String,

    /// Only expose tools annotated as read-only.
    pub read_only: bool,

    /// Hide tools annotated as destructive.
    pub disable_destructive: bool,

    /// Suppress tools/prompts list-changed notifications.
    pub stateless: bool,

    /// Require OAuth authorization on the HTTP transport.
    pub require_oauth: bool,

    /// Expected audience for token claim validation.
    pub oauth_audience: String,

    /// Scopes advertised through the protected resource metadata.
    pub oauth_scopes: Vec<String>,

    /// Strip dynamic client registration from proxied authorization
    /// server metadata.
    pub disable_dynamic_client_registration: bool,

    /// OAuth authorization server URL backing the well-known endpoints.
    pub authorization_url: String,

    /// Public URL of this server, used as the protected resource identifier.
    pub server_url: String,

    /// Path to a CA certificate bundle for the authorization server.
    pub certificate_authority: String,

    /// Cluster provider strategy.
    pub cluster_provider_strategy: ClusterProviderStrategy,

    /// Denied resources; requests resolving to a matching GVK are rejected
    /// before reaching the wire.
    pub denied_resources: Vec<GvkRule>,

    /// Explicit tool allowlist. When set, only these names are exposed.
    pub enabled_tools: Option<Vec<String>>,

    /// Explicit tool denylist.
    pub disabled_tools: Option<Vec<String>>,

    /// User-declared prompts.
    pub prompts: Vec<PromptDefinition>,

    /// Instructions string advertised to MCP clients on initialize.
    pub server_instructions: String,

    /// Log verbosity, 0 (quiet) to 9 (trace).
    #[validate(range(min = 0, max = 9, message = "Log level must be between 0 and 9"))]
    pub log_level: i32,

    /// Token exchange strategy used for per-target exchanges.
    pub token_exchange_strategy: String,

    /// Server-wide token exchange, applied when the selected target has no
    /// per-target configuration.
    pub token_exchange: Option<TargetTokenExchangeConfig>,

    /// Per-target cluster configuration, keyed by target name.
    pub cluster_provider_configs: HashMap<String, TargetClusterConfig>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            sse_base_url: String::new(),
            kubeconfig: String::new(),
            toolsets: vec!["core".to_string(), "config".to_string(), "helm".to_string()],
            list_output: "table".to_string(),
            read_only: false,
            disable_destructive: false,
            stateless: false,
            require_oauth: false,
            oauth_audience: String::new(),
            oauth_scopes: Vec::new(),
            disable_dynamic_client_registration: false,
            authorization_url: String::new(),
            server_url: String::new(),
            certificate_authority: String::new(),
            cluster_provider_strategy: ClusterProviderStrategy::Auto,
            denied_resources: Vec::new(),
            enabled_tools: None,
            disabled_tools: None,
            prompts: Vec::new(),
            server_instructions: String::new(),
            log_level: 0,
            token_exchange_strategy: String::new(),
            token_exchange: None,
            cluster_provider_configs: HashMap::new(),
        }
    }
}

impl StaticConfig {
    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(KubegateError::from)?;
        self.validate_custom()
    }

    /// Custom validation logic that goes beyond what the validator crate
    /// can express.
    fn validate_custom(&self) -> Result<()> {
        if output::from_name(&self.list_output).is_none() {
            return Err(KubegateError::validation(format!(
                "invalid output name: {}, valid names are: {}",
                self.list_output,
                output::NAMES.join(", ")
            )));
        }

        toolsets::validate(&self.toolsets)?;

        if !self.require_oauth
            && (!self.oauth_audience.is_empty()
                || !self.authorization_url.is_empty()
                || !self.server_url.is_empty()
                || !self.certificate_authority.is_empty())
        {
            return Err(KubegateError::validation(
                "oauth_audience, authorization_url, server_url and certificate_authority \
                 are only valid if require_oauth is enabled (a missing port implicitly \
                 disables require_oauth)",
            ));
        }

        if !self.authorization_url.is_empty() {
            let url = url::Url::parse(&self.authorization_url).map_err(|e| {
                KubegateError::validation_field(
                    format!("authorization_url is not a valid URL: {}", e),
                    "authorization_url",
                )
            })?;
            match url.scheme() {
                "https" => {}
                "http" => {
                    tracing::warn!(
                        "authorization_url is using http://, this is not recommended for \
                         production use"
                    );
                }
                other => {
                    return Err(KubegateError::validation_field(
                        format!("authorization_url must be http or https, got {}", other),
                        "authorization_url",
                    ));
                }
            }
        }

        let ca = self.certificate_authority.trim();
        if !ca.is_empty() && !std::path::Path::new(ca).is_file() {
            return Err(KubegateError::validation_field(
                format!("certificate_authority must be a valid file path: {}", ca),
                "certificate_authority",
            ));
        }

        if let Some(exchange) = &self.token_exchange {
            exchange.validate()?;
        }
        for (target, target_config) in &self.cluster_provider_configs {
            if let Some(exchange) = &target_config.token_exchange {
                exchange.validate().map_err(|e| {
                    KubegateError::validation(format!(
                        "token exchange configuration for target \"{}\": {}",
                        target, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Token exchange configuration for the given target, if declared.
    pub fn target_token_exchange(&self, target: &str) -> Option<&TargetTokenExchangeConfig> {
        self.cluster_provider_configs.get(target).and_then(|c| c.token_exchange.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = StaticConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_list_output_rejected() {
        let config = StaticConfig { list_output: "xml".to_string(), ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid output name"));
    }

    #[test]
    fn test_unknown_toolset_rejected() {
        let config = StaticConfig {
            toolsets: vec!["core".to_string(), "nope".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oauth_fields_require_oauth_enabled() {
        let config = StaticConfig {
            oauth_audience: "mcp".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("require_oauth"));

        let config = StaticConfig {
            require_oauth: true,
            oauth_audience: "mcp".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_authorization_url_must_be_http_or_https() {
        let config = StaticConfig {
            require_oauth: true,
            authorization_url: "ftp://idp.example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StaticConfig {
            require_oauth: true,
            authorization_url: "https://idp.example.com/realms/k8s".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_certificate_authority_must_exist() {
        let config = StaticConfig {
            require_oauth: true,
            certificate_authority: "/does/not/exist.pem".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_range() {
        let config = StaticConfig { log_level: 12, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gvk_rule_matching() {
        let exact = GvkRule {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Pod".to_string(),
        };
        assert!(exact.matches("", "v1", "Pod"));
        assert!(!exact.matches("", "v1", "Secret"));
        assert!(!exact.matches("apps", "v1", "Pod"));

        let wildcard_kind =
            GvkRule { group: String::new(), version: "v1".to_string(), kind: String::new() };
        assert!(wildcard_kind.matches("", "v1", "Pod"));
        assert!(wildcard_kind.matches("", "v1", "ConfigMap"));
        assert!(!wildcard_kind.matches("apps", "v1", "Deployment"));
    }

    #[test]
    fn test_strategy_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: ClusterProviderStrategy,
        }

        let w: Wrapper = toml::from_str(r#"strategy = "in-cluster""#).unwrap();
        assert_eq!(w.strategy, ClusterProviderStrategy::InCluster);
        let w: Wrapper = toml::from_str(r#"strategy = "kubeconfig""#).unwrap();
        assert_eq!(w.strategy, ClusterProviderStrategy::Kubeconfig);
        let w: Wrapper = toml::from_str(r#"strategy = "disabled""#).unwrap();
        assert_eq!(w.strategy, ClusterProviderStrategy::Disabled);
    }

    #[test]
    fn test_target_token_exchange_lookup() {
        let toml_input = r#"
            [cluster_provider_configs.prod.token_exchange]
            token_url = "https://idp.example.com/token"
            client_id = "kubegate"
            audience = "prod-cluster"
            subject_token_type = "urn:ietf:params:oauth:token-type:access_token"
        "#;
        let config: StaticConfig = toml::from_str(toml_input).unwrap();
        assert!(config.target_token_exchange("prod").is_some());
        assert!(config.target_token_exchange("staging").is_none());
    }
}
