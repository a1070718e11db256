//! Per-target token exchange configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{KubegateError, Result};

/// Client credentials are sent as form parameters.
pub const AUTH_STYLE_PARAMS: &str = "params";
/// Client credentials are sent as an HTTP Basic Authentication header.
pub const AUTH_STYLE_HEADER: &str = "header";

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Token exchange configuration for a single target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetTokenExchangeConfig {
    /// Token endpoint for the target.
    pub token_url: String,
    /// OAuth client ID for the target.
    pub client_id: String,
    /// OAuth client secret for the target.
    pub client_secret: String,
    /// Audience for the exchanged token.
    pub audience: String,
    /// Token type of the subject token.
    /// Same-realm exchanges use `urn:ietf:params:oauth:token-type:access_token`,
    /// cross-realm exchanges use `urn:ietf:params:oauth:token-type:jwt`.
    pub subject_token_type: String,
    /// IdP alias for cross-realm exchanges (Keycloak v1 only).
    pub subject_issuer: String,
    /// Optional scopes to request during the exchange.
    pub scopes: Vec<String>,
    /// CA certificate file for a token endpoint signed by a private CA.
    pub ca_file: String,
    /// How client credentials are sent: `params` (default) or `header`.
    pub auth_style: String,
}

impl TargetTokenExchangeConfig {
    /// Check that the configuration values are valid.
    pub fn validate(&self) -> Result<()> {
        if !self.auth_style.is_empty()
            && self.auth_style != AUTH_STYLE_PARAMS
            && self.auth_style != AUTH_STYLE_HEADER
        {
            return Err(KubegateError::validation_field(
                format!(
                    "invalid auth_style \"{}\": must be \"{}\" or \"{}\"",
                    self.auth_style, AUTH_STYLE_PARAMS, AUTH_STYLE_HEADER
                ),
                "auth_style",
            ));
        }
        Ok(())
    }

    /// HTTP client configured to talk to this target's identity provider:
    /// the 30 second exchange timeout and the configured CA bundle when
    /// present, otherwise the system roots.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(EXCHANGE_TIMEOUT);

        if !self.ca_file.is_empty() {
            let pem = std::fs::read(&self.ca_file).map_err(|e| KubegateError::Io {
                source: e,
                context: format!("failed to read CA file '{}'", self.ca_file),
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                KubegateError::config(format!(
                    "failed to parse CA certificate from '{}': {}",
                    self.ca_file, e
                ))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        builder.build().map_err(|e| {
            KubegateError::config(format!(
                "failed to build HTTP client for token exchange: {}",
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_style_validation() {
        let mut cfg = TargetTokenExchangeConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.auth_style = AUTH_STYLE_PARAMS.to_string();
        assert!(cfg.validate().is_ok());

        cfg.auth_style = AUTH_STYLE_HEADER.to_string();
        assert!(cfg.validate().is_ok());

        cfg.auth_style = "bearer".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid auth_style"));
    }

    #[test]
    fn test_http_client_without_ca_builds() {
        let cfg = TargetTokenExchangeConfig {
            token_url: "https://idp.example.com/token".to_string(),
            ..Default::default()
        };
        assert!(cfg.http_client().is_ok());
    }

    #[test]
    fn test_missing_ca_file_is_an_error() {
        let cfg = TargetTokenExchangeConfig {
            ca_file: "/definitely/not/here.pem".to_string(),
            ..Default::default()
        };
        assert!(cfg.http_client().is_err());
    }

    #[test]
    fn test_deserialization_rejects_unknown_keys() {
        let err = toml::from_str::<TargetTokenExchangeConfig>(
            r#"
                token_url = "https://idp/token"
                refresh_interval = 30
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("refresh_interval"));
    }
}
