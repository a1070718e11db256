//! Wire-level behavior of the token exchangers against a mock identity
//! provider.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kubegate::tokenexchange::{
    self, TargetTokenExchangeConfig, TokenExchanger, GRANT_TYPE_TOKEN_EXCHANGE,
    STRATEGY_KEYCLOAK_V1, STRATEGY_RFC8693, TOKEN_TYPE_ACCESS_TOKEN,
};

fn exchange_config(server: &MockServer) -> TargetTokenExchangeConfig {
    TargetTokenExchangeConfig {
        token_url: format!("{}/token", server.uri()),
        client_id: "kubegate".to_string(),
        client_secret: "hunter2".to_string(),
        audience: "prod-cluster".to_string(),
        subject_token_type: TOKEN_TYPE_ACCESS_TOKEN.to_string(),
        ..Default::default()
    }
}

async fn token_endpoint(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST")).and(path("/token")).respond_with(response).mount(server).await;
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": "exchanged-token",
        "token_type": "Bearer",
        "expires_in": 300
    }))
}

async fn sent_body(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    String::from_utf8(requests[0].body.clone()).unwrap()
}

#[tokio::test]
async fn rfc8693_exchange_sends_standard_form() {
    let server = MockServer::start().await;
    token_endpoint(&server, success_response()).await;

    let cfg = exchange_config(&server);
    let exchanger = tokenexchange::exchanger(STRATEGY_RFC8693).unwrap();
    let token = exchanger.exchange(&cfg, "subject-token-T").await.unwrap();

    assert_eq!(token.access_token, "exchanged-token");
    assert!(token.expires_at.is_some());

    let body = sent_body(&server).await;
    let encoded_grant: String =
        url::form_urlencoded::byte_serialize(GRANT_TYPE_TOKEN_EXCHANGE.as_bytes()).collect();
    assert!(body.contains(&format!("grant_type={}", encoded_grant)));
    assert!(body.contains("subject_token=subject-token-T"));
    assert!(body.contains("audience=prod-cluster"));
    assert!(body.contains("client_id=kubegate"));
    assert!(body.contains("client_secret=hunter2"));
    // RFC 8693 requests an access token back
    let encoded_token_type: String =
        url::form_urlencoded::byte_serialize(TOKEN_TYPE_ACCESS_TOKEN.as_bytes()).collect();
    assert!(body.contains(&format!("requested_token_type={}", encoded_token_type)));
}

#[tokio::test]
async fn keycloak_v1_exchange_adds_subject_issuer() {
    let server = MockServer::start().await;
    token_endpoint(&server, success_response()).await;

    let cfg = TargetTokenExchangeConfig {
        subject_issuer: "upstream-idp".to_string(),
        ..exchange_config(&server)
    };
    let exchanger = tokenexchange::exchanger(STRATEGY_KEYCLOAK_V1).unwrap();
    exchanger.exchange(&cfg, "subject-token-T").await.unwrap();

    let body = sent_body(&server).await;
    assert!(body.contains("subject_issuer=upstream-idp"));
    assert!(!body.contains("requested_token_type"));
}

#[tokio::test]
async fn header_auth_style_uses_basic_authentication() {
    let server = MockServer::start().await;
    token_endpoint(&server, success_response()).await;

    let cfg = TargetTokenExchangeConfig {
        auth_style: tokenexchange::AUTH_STYLE_HEADER.to_string(),
        ..exchange_config(&server)
    };
    let exchanger = tokenexchange::exchanger(STRATEGY_RFC8693).unwrap();
    exchanger.exchange(&cfg, "subject-token-T").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let authorization = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(authorization.starts_with("Basic "));

    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(!body.contains("client_id="));
    assert!(!body.contains("client_secret="));
}

#[tokio::test]
async fn scopes_are_joined_with_spaces() {
    let server = MockServer::start().await;
    token_endpoint(&server, success_response()).await;

    let cfg = TargetTokenExchangeConfig {
        scopes: vec!["openid".to_string(), "groups".to_string()],
        ..exchange_config(&server)
    };
    let exchanger = tokenexchange::exchanger(STRATEGY_RFC8693).unwrap();
    exchanger.exchange(&cfg, "subject-token-T").await.unwrap();

    let body = sent_body(&server).await;
    assert!(body.contains("scope=openid+groups") || body.contains("scope=openid%20groups"));
}

#[tokio::test]
async fn rejection_surfaces_status_without_response_body() {
    let server = MockServer::start().await;
    token_endpoint(
        &server,
        ResponseTemplate::new(403)
            .set_body_string("secret internal detail that must not leak"),
    )
    .await;

    let cfg = exchange_config(&server);
    let exchanger = tokenexchange::exchanger(STRATEGY_RFC8693).unwrap();
    let err = exchanger.exchange(&cfg, "subject-token-T").await.unwrap_err();

    let text = err.to_string();
    assert!(text.contains("status 403"));
    assert!(!text.contains("secret internal detail"));
    assert!(!text.contains("subject-token-T"));
}

#[tokio::test]
async fn malformed_response_is_an_error() {
    let server = MockServer::start().await;
    token_endpoint(&server, ResponseTemplate::new(200).set_body_string("not json")).await;

    let cfg = exchange_config(&server);
    let exchanger = tokenexchange::exchanger(STRATEGY_RFC8693).unwrap();
    assert!(exchanger.exchange(&cfg, "subject-token-T").await.is_err());
}
