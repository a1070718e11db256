//! Access-control transport layer.
//!
//! A `tower` layer wrapping the Kubernetes client's service stack. Every
//! outgoing request is resolved to a group/version/kind and matched against
//! the denied-resources list; a match fails the request before anything
//! reaches the wire.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Request;
use once_cell::sync::Lazy;
use regex::Regex;
use tower::{BoxError, Layer, Service};

use crate::config::GvkRule;
use crate::errors::{KubegateError, Result};

/// Resolves a resource plural to its kind through the discovery API.
#[async_trait::async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn kind_for(&self, group: &str, version: &str, resource: &str) -> Result<String>;
}

/// Well-known endpoints that bypass access control entirely.
const UNPROTECTED_ENDPOINTS: &[&str] =
    &["/healthz", "/readyz", "/livez", "/metrics", "/version"];

/// API discovery roots, with an optional trailing slash. The core API has
/// no group segment, so its discovery paths are only `/api` and
/// `/api/<version>`; anything deeper addresses a resource. Named groups
/// go one level further: `/apis`, `/apis/<group>`, `/apis/<group>/<version>`.
static DISCOVERY_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:/api(?:/[^/]+)?|/apis(?:/[^/]+(?:/[^/]+)?)?)/?$").expect("valid regex")
});

/// Request path resolved to an API resource address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResourcePath {
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// Parse an API request path into group, version, and resource plural.
///
/// Returns `None` for unprotected endpoints, discovery roots, and paths
/// outside the API surface.
pub fn parse_resource_path(path: &str) -> Option<ParsedResourcePath> {
    if UNPROTECTED_ENDPOINTS.contains(&path) || DISCOVERY_PATH.is_match(path) {
        return None;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (group, version, rest) = match segments.as_slice() {
        ["api", version, rest @ ..] => (String::new(), version.to_string(), rest),
        ["apis", group, version, rest @ ..] => (group.to_string(), version.to_string(), rest),
        _ => return None,
    };

    // Skip a /namespaces/<ns> infix; /api/v1/namespaces alone addresses the
    // namespaces resource itself.
    let resource = match rest {
        ["namespaces", _ns, resource, ..] => resource,
        [resource, ..] => resource,
        [] => return None,
    };

    Some(ParsedResourcePath { group, version, resource: resource.to_string() })
}

/// Layer inserting the access-control interceptor into a client stack.
#[derive(Clone)]
pub struct AccessControlLayer {
    rules: Arc<Vec<GvkRule>>,
    resolver: Arc<dyn ResourceResolver>,
}

impl AccessControlLayer {
    pub fn new(rules: Arc<Vec<GvkRule>>, resolver: Arc<dyn ResourceResolver>) -> Self {
        Self { rules, resolver }
    }
}

impl<S> Layer<S> for AccessControlLayer {
    type Service = AccessControl<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessControl { inner, rules: self.rules.clone(), resolver: self.resolver.clone() }
    }
}

/// The access-control service wrapper.
pub struct AccessControl<S> {
    inner: S,
    rules: Arc<Vec<GvkRule>>,
    resolver: Arc<dyn ResourceResolver>,
}

impl<S: Clone> Clone for AccessControl<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            rules: self.rules.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<S, B> Service<Request<B>> for AccessControl<S>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Into<BoxError>,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<S::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // Swap in the cloned inner service so the original keeps its
        // readiness state (standard tower clone-and-replace).
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let rules = self.rules.clone();
        let resolver = self.resolver.clone();

        Box::pin(async move {
            if let Some(parsed) = parse_resource_path(request.uri().path()) {
                let kind = resolver
                    .kind_for(&parsed.group, &parsed.version, &parsed.resource)
                    .await
                    .map_err(|e| -> BoxError {
                        Box::new(KubegateError::discovery(format!(
                            "failed to make request: {}",
                            e
                        )))
                    })?;

                if rules.iter().any(|rule| rule.matches(&parsed.group, &parsed.version, &kind)) {
                    return Err(Box::new(KubegateError::resource_denied(
                        parsed.group,
                        parsed.version,
                        kind,
                    )) as BoxError);
                }
            }

            inner.call(request).await.map_err(Into::into)
        })
    }
}
