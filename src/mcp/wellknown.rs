//! Well-known endpoint reverse proxy.
//!
//! Proxies OAuth metadata requests to the configured authorization server
//! and rewrites the response body: dynamic client registration is stripped
//! when disabled, and the advertised scopes are replaced with the
//! configured set. All other headers pass through verbatim.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::config::StaticConfig;

/// Proxied well-known suffixes.
pub const WELL_KNOWN_ENDPOINTS: &[&str] = &[
    "oauth-authorization-server",
    "oauth-protected-resource",
    "openid-configuration",
];

/// Hop-by-hop headers that must not be forwarded, plus length/encoding
/// headers invalidated by the body rewrite.
const DROPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
];

/// Forward a well-known request to the authorization server and rewrite
/// the metadata body.
pub async fn proxy(
    config: &StaticConfig,
    http: &reqwest::Client,
    endpoint: &str,
) -> Response {
    if !WELL_KNOWN_ENDPOINTS.contains(&endpoint) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if config.authorization_url.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            "no authorization server configured".to_string(),
        )
            .into_response();
    }

    let upstream_url = format!(
        "{}/.well-known/{}",
        config.authorization_url.trim_end_matches('/'),
        endpoint
    );

    let upstream = match http.get(&upstream_url).send().await {
        Ok(response) => response,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                format!("authorization server unreachable: {}", e),
            )
                .into_response();
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if DROPPED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
            axum::http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.insert(name, value);
        }
    }

    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                format!("failed to read authorization server response: {}", e),
            )
                .into_response();
        }
    };

    // Metadata rewriting only applies to JSON bodies; anything else is
    // forwarded untouched.
    match serde_json::from_slice::<Value>(&body) {
        Ok(mut metadata) => {
            rewrite_metadata(&mut metadata, config);
            let rewritten = serde_json::to_vec(&metadata).unwrap_or_else(|_| body.to_vec());
            (status, headers, rewritten).into_response()
        }
        Err(_) => (status, headers, body.to_vec()).into_response(),
    }
}

/// Apply the configured rewrites to an authorization server metadata
/// document.
pub fn rewrite_metadata(metadata: &mut Value, config: &StaticConfig) {
    let Some(object) = metadata.as_object_mut() else {
        return;
    };

    if config.disable_dynamic_client_registration {
        object.remove("registration_endpoint");
        object.insert("require_request_uri_registration".to_string(), Value::Bool(false));
    }

    if !config.oauth_scopes.is_empty() {
        object.insert(
            "scopes_supported".to_string(),
            Value::Array(
                config.oauth_scopes.iter().map(|s| Value::String(s.clone())).collect(),
            ),
        );
    }
}
