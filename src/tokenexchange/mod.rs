//! # OAuth Token Exchange
//!
//! Strategy-dispatched OAuth 2.0 token exchange. Two strategies are
//! registered process-wide: standard RFC 8693 exchange and Keycloak's v1
//! variant, which adds a `subject_issuer` form field for cross-realm
//! exchanges.

mod config;
mod keycloak_v1;
mod rfc8693;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::errors::{KubegateError, Result};

pub use config::{TargetTokenExchangeConfig, AUTH_STYLE_HEADER, AUTH_STYLE_PARAMS};
pub use keycloak_v1::KeycloakV1Exchanger;
pub use rfc8693::Rfc8693Exchanger;

pub const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const TOKEN_TYPE_ACCESS_TOKEN: &str = "urn:ietf:params:oauth:token-type:access_token";
pub const TOKEN_TYPE_JWT: &str = "urn:ietf:params:oauth:token-type:jwt";

pub const FORM_KEY_GRANT_TYPE: &str = "grant_type";
pub const FORM_KEY_SUBJECT_TOKEN: &str = "subject_token";
pub const FORM_KEY_SUBJECT_TOKEN_TYPE: &str = "subject_token_type";
pub const FORM_KEY_SUBJECT_ISSUER: &str = "subject_issuer";
pub const FORM_KEY_AUDIENCE: &str = "audience";
pub const FORM_KEY_CLIENT_ID: &str = "client_id";
pub const FORM_KEY_CLIENT_SECRET: &str = "client_secret";
pub const FORM_KEY_SCOPE: &str = "scope";
pub const FORM_KEY_REQUESTED_TOKEN_TYPE: &str = "requested_token_type";

pub const STRATEGY_KEYCLOAK_V1: &str = "keycloak-v1";
pub const STRATEGY_RFC8693: &str = "rfc8693";

/// A token obtained from an exchange endpoint.
#[derive(Debug, Clone)]
pub struct ExchangedToken {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Capability implemented by every exchange strategy.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        cfg: &TargetTokenExchangeConfig,
        subject_token: &str,
    ) -> Result<ExchangedToken>;
}

static EXCHANGER_REGISTRY: Lazy<HashMap<&'static str, Arc<dyn TokenExchanger>>> =
    Lazy::new(|| {
        let mut registry: HashMap<&'static str, Arc<dyn TokenExchanger>> = HashMap::new();
        registry.insert(STRATEGY_RFC8693, Arc::new(Rfc8693Exchanger));
        registry.insert(STRATEGY_KEYCLOAK_V1, Arc::new(KeycloakV1Exchanger));
        registry
    });

/// Look up a registered exchanger by strategy name.
pub fn exchanger(strategy: &str) -> Option<Arc<dyn TokenExchanger>> {
    EXCHANGER_REGISTRY.get(strategy).cloned()
}

/// Names of the registered strategies.
pub fn strategy_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = EXCHANGER_REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Wire shape of the token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Add client credentials to the request according to the configured auth
/// style: form parameters (default) or an HTTP Basic header.
fn inject_client_auth(
    cfg: &TargetTokenExchangeConfig,
    form: &mut Vec<(&'static str, String)>,
) -> Option<String> {
    if cfg.client_id.is_empty() {
        return None;
    }

    if cfg.auth_style == AUTH_STYLE_HEADER {
        let credentials = format!("{}:{}", cfg.client_id, cfg.client_secret);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        return Some(format!("Basic {}", encoded));
    }

    form.push((FORM_KEY_CLIENT_ID, cfg.client_id.clone()));
    if !cfg.client_secret.is_empty() {
        form.push((FORM_KEY_CLIENT_SECRET, cfg.client_secret.clone()));
    }
    None
}

/// POST the exchange form to the token endpoint and parse the response.
///
/// Non-success responses surface the status code only; neither the response
/// body nor the subject token is included in the returned error.
async fn do_token_exchange(
    cfg: &TargetTokenExchangeConfig,
    form: Vec<(&'static str, String)>,
    authorization: Option<String>,
) -> Result<ExchangedToken> {
    let client = cfg.http_client()?;

    let mut request = client.post(&cfg.token_url).form(&form);
    if let Some(authorization) = authorization {
        request = request.header(reqwest::header::AUTHORIZATION, authorization);
    }

    let response = request.send().await.map_err(|e| {
        KubegateError::token_exchange(format!("token exchange request failed: {}", e), None)
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(KubegateError::token_exchange(
            "identity provider rejected the exchange request",
            Some(status.as_u16()),
        ));
    }

    let body: TokenExchangeResponse = response.json().await.map_err(|e| {
        KubegateError::token_exchange(
            format!("failed to parse token exchange response: {}", e),
            None,
        )
    })?;

    let expires_at =
        (body.expires_in > 0).then(|| Utc::now() + Duration::seconds(body.expires_in));

    Ok(ExchangedToken {
        access_token: body.access_token,
        token_type: body.token_type,
        refresh_token: body.refresh_token,
        expires_at,
    })
}
