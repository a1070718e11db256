//! Well-known reverse proxy rewriting against a mock authorization
//! server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kubegate::mcp::wellknown;
use kubegate::StaticConfig;

async fn metadata_backend(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .insert_header("x-backend-header", "preserved"),
        )
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> StaticConfig {
    StaticConfig {
        require_oauth: true,
        authorization_url: server.uri(),
        ..Default::default()
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn disabled_registration_is_stripped_from_metadata() {
    let server = MockServer::start().await;
    metadata_backend(
        &server,
        serde_json::json!({
            "issuer": server.uri(),
            "registration_endpoint": format!("{}/register", server.uri()),
            "require_request_uri_registration": true,
            "scopes_supported": ["openid", "profile"]
        }),
    )
    .await;

    let config = StaticConfig {
        disable_dynamic_client_registration: true,
        ..config_for(&server)
    };

    let response =
        wellknown::proxy(&config, &reqwest::Client::new(), "openid-configuration").await;
    assert_eq!(response.status(), 200);

    let metadata = body_json(response).await;
    assert!(metadata.get("registration_endpoint").is_none());
    assert_eq!(metadata["require_request_uri_registration"], false);
    // The backend's scopes survive when no override is configured
    assert_eq!(metadata["scopes_supported"], serde_json::json!(["openid", "profile"]));
}

#[tokio::test]
async fn configured_scopes_replace_backend_scopes() {
    let server = MockServer::start().await;
    metadata_backend(
        &server,
        serde_json::json!({
            "issuer": server.uri(),
            "scopes_supported": ["openid"]
        }),
    )
    .await;

    let config = StaticConfig {
        oauth_scopes: vec!["mcp:read".to_string()],
        ..config_for(&server)
    };

    let response =
        wellknown::proxy(&config, &reqwest::Client::new(), "openid-configuration").await;
    let metadata = body_json(response).await;
    assert_eq!(metadata["scopes_supported"], serde_json::json!(["mcp:read"]));
}

#[tokio::test]
async fn backend_headers_are_forwarded() {
    let server = MockServer::start().await;
    metadata_backend(&server, serde_json::json!({"issuer": server.uri()})).await;

    let response =
        wellknown::proxy(&config_for(&server), &reqwest::Client::new(), "openid-configuration")
            .await;
    assert_eq!(
        response.headers().get("x-backend-header").unwrap().to_str().unwrap(),
        "preserved"
    );
}

#[tokio::test]
async fn unknown_endpoint_is_not_proxied() {
    let server = MockServer::start().await;
    let response =
        wellknown::proxy(&config_for(&server), &reqwest::Client::new(), "smtp-configuration")
            .await;
    assert_eq!(response.status(), 404);
    // Nothing reached the backend
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_authorization_url_yields_not_found() {
    let config = StaticConfig::default();
    let response =
        wellknown::proxy(&config, &reqwest::Client::new(), "openid-configuration").await;
    assert_eq!(response.status(), 404);
}
