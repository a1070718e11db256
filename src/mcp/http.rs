//! HTTP transports for the MCP server.
//!
//! Serves streamable HTTP on `/mcp`, classic SSE on `/sse` + `/message`,
//! the health probe, and the well-known reverse proxies, with the OAuth
//! authorization middleware wrapped around everything. Lifecycle: SIGINT
//! and SIGTERM trigger a graceful shutdown bounded by a 10 second
//! deadline.

use std::convert::Infallible;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::middleware::{authorize, AuthState, CallerIdentity, TokenScopes};
use crate::auth::OidcProvider;
use crate::errors::{KubegateError, Result};
use crate::mcp::handler::McpHandler;
use crate::mcp::invoke::CallContext;
use crate::mcp::protocol::JsonRpcRequest;
use crate::mcp::server::McpServer;
use crate::mcp::sse::{sse_response, SseSessionManager};
use crate::mcp::wellknown;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub server: Arc<McpServer>,
    pub sessions: Arc<SseSessionManager>,
    pub http_client: reqwest::Client,
}

/// Build the HTTP router.
pub fn router(
    server: Arc<McpServer>,
    oidc: Option<Arc<OidcProvider>>,
    http_client: reqwest::Client,
) -> Router {
    let state = HttpState {
        server: server.clone(),
        sessions: Arc::new(SseSessionManager::new()),
        http_client,
    };

    // Forward list-changed notifications to every open SSE session.
    let sessions = state.sessions.clone();
    let mut notifications = server.subscribe_notifications();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    if let Ok(value) = serde_json::to_value(&notification) {
                        sessions.broadcast(&value);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification forwarder lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let auth_state = AuthState { config: server.config_cell(), oidc };

    Router::new()
        .route("/mcp", post(mcp_post_handler))
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route("/.well-known/{endpoint}", get(well_known_handler))
        .layer(from_fn_with_state(auth_state, authorize))
        .with_state(state)
}

/// Serve the router until a termination signal arrives.
pub async fn serve(
    server: Arc<McpServer>,
    oidc: Option<Arc<OidcProvider>>,
    http_client: reqwest::Client,
) -> Result<()> {
    let config = server.config();
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| KubegateError::Io {
        source: e,
        context: format!("failed to bind {}", addr),
    })?;

    info!(
        port = %config.port,
        "Streaming and SSE HTTP servers starting on paths /mcp, /sse, /message"
    );

    let app = router(server, oidc, http_client);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received termination signal, initiating graceful shutdown");
        let _ = shutdown_tx.send(true);
    });

    let mut deadline_rx = shutdown_rx.clone();
    let graceful = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let mut shutdown_rx = shutdown_rx;
            let _ = shutdown_rx.wait_for(|stopping| *stopping).await;
        })
        .into_future();

    tokio::select! {
        result = graceful => {
            result.map_err(|e| KubegateError::Io {
                source: e,
                context: "HTTP server error".to_string(),
            })?;
            info!("HTTP server shutdown complete");
            Ok(())
        }
        _ = async {
            let _ = deadline_rx.wait_for(|stopping| *stopping).await;
            tokio::time::sleep(SHUTDOWN_TIMEOUT).await;
        } => {
            warn!("graceful shutdown deadline exceeded, exiting");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn call_context(identity: CallerIdentity, scopes: TokenScopes) -> CallContext {
    CallContext { bearer: identity.0, scopes: scopes.0 }
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

/// POST /mcp: streamable HTTP transport. Responds with JSON, or with a
/// single-message SSE stream when the client asks for one.
async fn mcp_post_handler(
    State(state): State<HttpState>,
    Extension(identity): Extension<CallerIdentity>,
    Extension(scopes): Extension<TokenScopes>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let handler = McpHandler::new(state.server.clone(), call_context(identity, scopes));
    let response = handler.handle_request(request).await;

    if accepts_event_stream(&headers) {
        let data = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string());
        let stream = tokio_stream::once(Ok::<_, Infallible>(
            Event::default().event("message").data(data),
        ));
        return Sse::new(stream).into_response();
    }

    Json(response).into_response()
}

/// GET /sse: open a streaming session.
async fn sse_handler(State(state): State<HttpState>) -> Response {
    let base_url = state.server.config().sse_base_url.clone();
    sse_response(state.sessions.clone(), &base_url).into_response()
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
}

/// POST /message: submit a request for an SSE session. The response is
/// delivered over the session's stream; the POST returns 202.
async fn message_handler(
    State(state): State<HttpState>,
    Query(query): Query<MessageQuery>,
    Extension(identity): Extension<CallerIdentity>,
    Extension(scopes): Extension<TokenScopes>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let handler = McpHandler::new(state.server.clone(), call_context(identity, scopes));
    let response = handler.handle_request(request).await;

    let Ok(value) = serde_json::to_value(&response) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    if state.sessions.send_to(&query.session_id, value) {
        StatusCode::ACCEPTED.into_response()
    } else {
        (StatusCode::NOT_FOUND, "unknown session").into_response()
    }
}

/// GET /.well-known/{endpoint}: reverse proxy to the authorization
/// server.
async fn well_known_handler(
    State(state): State<HttpState>,
    Path(endpoint): Path<String>,
) -> Response {
    let config = state.server.config();
    wellknown::proxy(&config, &state.http_client, &endpoint).await
}
