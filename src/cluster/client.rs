//! Derived Kubernetes client construction.
//!
//! Builds a `kube::Client` over an explicit tower service stack so the
//! access-control interceptor and the caller's bearer credential can be
//! wired into the transport. A caller credential, when present, replaces
//! whatever authentication the kubeconfig would have provided.

use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::AUTHORIZATION;
use http::{HeaderValue, Request};
use hyper_util::rt::TokioExecutor;
use kube::client::ConfigExt;
use tower::{Layer, Service, ServiceBuilder};

use crate::cluster::access_control::{AccessControlLayer, ResourceResolver};
use crate::config::GvkRule;
use crate::errors::{KubegateError, Result};

/// Build a plain client for discovery and watcher traffic. Not wrapped by
/// access control; the discovery endpoints it touches are exempt anyway.
pub fn build_plain_client(config: kube::Config) -> Result<kube::Client> {
    kube::Client::try_from(config).map_err(|e| {
        KubegateError::transport("failed to create Kubernetes client", Box::new(e))
    })
}

/// Build a derived client pinned to the given configuration, wrapped by the
/// access-control layer, and carrying the caller's credential when one is
/// present.
pub fn build_derived_client(
    config: kube::Config,
    bearer: Option<&str>,
    rules: Arc<Vec<GvkRule>>,
    resolver: Arc<dyn ResourceResolver>,
) -> Result<kube::Client> {
    let https_connector = config.rustls_https_connector().map_err(|e| {
        KubegateError::transport("failed to create HTTPS connector", Box::new(e))
    })?;

    let bearer_layer = bearer.map(BearerAuthLayer::new).transpose()?;
    // The caller identity replaces the kubeconfig credential entirely.
    let kubeconfig_auth = if bearer_layer.is_some() {
        None
    } else {
        config.auth_layer().map_err(|e| {
            KubegateError::transport("failed to build client auth layer", Box::new(e))
        })?
    };

    let service = ServiceBuilder::new()
        .layer(config.base_uri_layer())
        .option_layer(bearer_layer)
        .option_layer(kubeconfig_auth)
        .layer(AccessControlLayer::new(rules, resolver))
        .service(
            hyper_util::client::legacy::Client::builder(TokioExecutor::new())
                .build(https_connector),
        );

    Ok(kube::Client::new(service, config.default_namespace))
}

/// Layer stamping a fixed bearer credential onto every request.
#[derive(Clone)]
pub struct BearerAuthLayer {
    value: HeaderValue,
}

impl BearerAuthLayer {
    pub fn new(token: &str) -> Result<Self> {
        let mut value =
            HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                KubegateError::validation("caller credential is not a valid header value")
            })?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuth { inner, value: self.value.clone() }
    }
}

/// Service wrapper applying the bearer credential.
#[derive(Clone)]
pub struct BearerAuth<S> {
    inner: S,
    value: HeaderValue,
}

impl<S, B> Service<Request<B>> for BearerAuth<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        request.headers_mut().insert(AUTHORIZATION, self.value.clone());
        self.inner.call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::{service_fn, BoxError, ServiceExt};

    #[tokio::test]
    async fn test_bearer_layer_overrides_existing_credential() {
        let layer = BearerAuthLayer::new("caller-token").unwrap();
        let service = layer.layer(service_fn(|request: Request<String>| async move {
            let auth = request.headers().get(AUTHORIZATION).cloned();
            Ok::<_, BoxError>(auth)
        }));

        let mut request = Request::builder().uri("/api/v1/pods").body(String::new()).unwrap();
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer kubeconfig-token"));

        let auth = service.oneshot(request).await.unwrap().unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer caller-token");
    }

    #[test]
    fn test_bearer_value_is_marked_sensitive() {
        let layer = BearerAuthLayer::new("secret").unwrap();
        assert!(layer.value.is_sensitive());
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        assert!(BearerAuthLayer::new("bad\ntoken").is_err());
    }
}
