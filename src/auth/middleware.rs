//! Axum middleware enforcing OAuth authorization on the HTTP transport.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::auth::claims::JwtClaims;
use crate::auth::oidc::OidcProvider;
use crate::config::StaticConfig;
use crate::errors::AuthErrorType;

/// Paths that never require a credential.
const HEALTH_ENDPOINT: &str = "/healthz";
const WELL_KNOWN_PREFIX: &str = "/.well-known/";

/// Shared state for the authorization middleware.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<ArcSwap<StaticConfig>>,
    pub oidc: Option<Arc<OidcProvider>>,
}

/// The caller's raw bearer credential, attached to the request extensions
/// for downstream propagation. Deliberately opaque: no `Debug` derive, so
/// the credential cannot leak through log formatting.
#[derive(Clone, Default)]
pub struct CallerIdentity(pub Option<String>);

/// Scopes parsed from the caller's token, attached on successful
/// validation. Currently informational; tool-level scope enforcement is not
/// enabled.
#[derive(Clone, Debug, Default)]
pub struct TokenScopes(pub Vec<String>);

/// Authorization middleware for the HTTP surface.
///
/// Health and well-known endpoints always pass. When OAuth is not required
/// the request passes untouched apart from identity propagation. Otherwise
/// the bearer token goes through offline validation (expiry, audience) and,
/// when an OIDC provider is configured, signature verification.
pub async fn authorize(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == HEALTH_ENDPOINT || path.starts_with(WELL_KNOWN_PREFIX) {
        return next.run(request).await;
    }

    let config = state.config.load();

    let token = bearer_token(&request);
    request.extensions_mut().insert(CallerIdentity(token.clone()));
    request.extensions_mut().insert(TokenScopes::default());

    if !config.require_oauth {
        return next.run(request).await;
    }

    let challenge = www_authenticate_challenge(&config.oauth_audience);

    let Some(token) = token else {
        debug!(
            method = %request.method(),
            path = %request.uri().path(),
            "Authentication failed - missing or invalid bearer token"
        );
        return unauthorized(&challenge, AuthErrorType::MissingToken, "Bearer token required");
    };

    let validated = JwtClaims::parse_unverified(&token)
        .and_then(|claims| {
            claims.validate_offline(&config.oauth_audience)?;
            Ok(claims)
        })
        .and_then(|claims| {
            if let Some(oidc) = &state.oidc {
                oidc.verify(&token, &config.oauth_audience)?;
            }
            Ok(claims)
        });

    match validated {
        Ok(claims) => {
            let scopes = claims.scopes();
            debug!(scopes = ?scopes, "JWT token validated");
            request.extensions_mut().insert(TokenScopes(scopes));
            next.run(request).await
        }
        Err(err) => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                error = %err,
                "Authentication failed - JWT validation error"
            );
            unauthorized(&challenge, AuthErrorType::InvalidToken, "Invalid token")
        }
    }
}

fn bearer_token<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn www_authenticate_challenge(audience: &str) -> String {
    let mut challenge = "Bearer realm=\"kubegate\"".to_string();
    if !audience.is_empty() {
        challenge.push_str(&format!(", audience=\"{}\"", audience));
    }
    challenge
}

fn unauthorized(challenge: &str, error_type: AuthErrorType, message: &str) -> Response {
    let header = format!("{}, error=\"{}\"", challenge, error_type);
    (
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", header)],
        format!("Unauthorized: {}", message),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    fn app(config: StaticConfig, oidc: Option<Arc<OidcProvider>>) -> Router {
        let state =
            AuthState { config: Arc::new(ArcSwap::from_pointee(config)), oidc };
        Router::new()
            .route("/mcp", get(|| async { "ok" }))
            .route("/healthz", get(|| async { "ok" }))
            .route("/.well-known/oauth-protected-resource", get(|| async { "{}" }))
            .layer(from_fn_with_state(state, authorize))
    }

    fn get_request(path: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_oauth_not_required_passes_without_credential() {
        let app = app(StaticConfig::default(), None);
        let response = app.oneshot(get_request("/mcp", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoint_bypasses_authorization() {
        let config = StaticConfig { require_oauth: true, ..Default::default() };
        let app = app(config, None);
        let response = app.oneshot(get_request("/healthz", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_well_known_bypasses_authorization() {
        let config = StaticConfig { require_oauth: true, ..Default::default() };
        let app = app(config, None);
        let response = app
            .oneshot(get_request("/.well-known/oauth-protected-resource", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_returns_401_with_challenge() {
        let config = StaticConfig { require_oauth: true, ..Default::default() };
        let app = app(config, None);
        let response = app.oneshot(get_request("/mcp", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers().get("WWW-Authenticate").unwrap().to_str().unwrap();
        assert!(challenge.contains("Bearer realm=\"kubegate\""));
        assert!(challenge.contains("error=\"missing_token\""));
    }

    #[tokio::test]
    async fn test_garbage_token_returns_401_invalid_token() {
        let config = StaticConfig { require_oauth: true, ..Default::default() };
        let app = app(config, None);
        let response = app.oneshot(get_request("/mcp", Some("not-a-jwt"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers().get("WWW-Authenticate").unwrap().to_str().unwrap();
        assert!(challenge.contains("error=\"invalid_token\""));
    }

    #[tokio::test]
    async fn test_valid_token_passes_offline_validation() {
        let token = crate::auth::claims::make_unsigned_token(serde_json::json!({
            "exp": 4102444800i64,
            "aud": "mcp-server",
            "scope": "mcp:read"
        }));

        let config = StaticConfig {
            require_oauth: true,
            oauth_audience: "mcp-server".to_string(),
            ..Default::default()
        };
        let app = app(config, None);
        let response = app.oneshot(get_request("/mcp", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_audience_mismatch_rejected() {
        let token = crate::auth::claims::make_unsigned_token(serde_json::json!({
            "exp": 4102444800i64,
            "aud": "someone-else"
        }));

        let config = StaticConfig {
            require_oauth: true,
            oauth_audience: "mcp-server".to_string(),
            ..Default::default()
        };
        let app = app(config, None);
        let response = app.oneshot(get_request("/mcp", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers().get("WWW-Authenticate").unwrap().to_str().unwrap();
        assert!(challenge.contains("audience=\"mcp-server\""));
    }
}
