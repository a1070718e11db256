//! OIDC provider discovery and token signature verification.

use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::errors::{AuthErrorType, KubegateError, Result};

/// Subset of the OIDC discovery document this server consumes.
#[derive(Debug, Clone, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

/// An OIDC provider resolved from the configured authorization URL.
///
/// Discovery runs once at startup; the JWKS is fetched at the same time and
/// reused for all subsequent verifications.
pub struct OidcProvider {
    issuer: String,
    jwks: JwkSet,
}

impl OidcProvider {
    /// Discover the provider behind `authorization_url` and fetch its JWKS.
    pub async fn discover(authorization_url: &str, http: &reqwest::Client) -> Result<Self> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            authorization_url.trim_end_matches('/')
        );

        let document: DiscoveryDocument = http
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| {
                KubegateError::config(format!("unable to reach OIDC provider: {}", e))
            })?
            .error_for_status()
            .map_err(|e| {
                KubegateError::config(format!("OIDC discovery request failed: {}", e))
            })?
            .json()
            .await
            .map_err(|e| {
                KubegateError::config(format!("failed to parse OIDC discovery document: {}", e))
            })?;

        let jwks: JwkSet = http
            .get(&document.jwks_uri)
            .send()
            .await
            .map_err(|e| KubegateError::config(format!("unable to fetch JWKS: {}", e)))?
            .error_for_status()
            .map_err(|e| KubegateError::config(format!("JWKS request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| KubegateError::config(format!("failed to parse JWKS: {}", e)))?;

        Ok(Self { issuer: document.issuer, jwks })
    }

    /// Construct a provider from an already-fetched JWKS. Test seam.
    pub fn from_parts(issuer: String, jwks: JwkSet) -> Self {
        Self { issuer, jwks }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify the token signature and standard claims against this
    /// provider.
    pub fn verify(&self, token: &str, audience: &str) -> Result<()> {
        let header = jsonwebtoken::decode_header(token).map_err(|e| {
            KubegateError::auth(
                format!("OIDC token validation error: {}", e),
                AuthErrorType::InvalidToken,
            )
        })?;

        let jwk = match &header.kid {
            Some(kid) => self.jwks.find(kid),
            None => self.jwks.keys.first(),
        }
        .ok_or_else(|| {
            KubegateError::auth(
                "OIDC token validation error: no matching key in JWKS",
                AuthErrorType::InvalidToken,
            )
        })?;

        let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| {
            KubegateError::auth(
                format!("OIDC token validation error: unusable JWKS key: {}", e),
                AuthErrorType::InvalidToken,
            )
        })?;

        let algorithm = match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => header.alg,
            AlgorithmParameters::EllipticCurve(_) => header.alg,
            AlgorithmParameters::OctetKeyPair(_) => Algorithm::EdDSA,
            AlgorithmParameters::OctetKey(_) => Algorithm::HS256,
        };

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        if audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[audience]);
        }

        jsonwebtoken::decode::<serde_json::Value>(token, &decoding_key, &validation)
            .map(|_| ())
            .map_err(|e| {
                KubegateError::auth(
                    format!("OIDC token validation error: {}", e),
                    AuthErrorType::InvalidToken,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_rejects_token_without_matching_key() {
        let provider = OidcProvider::from_parts(
            "https://idp.example.com".to_string(),
            JwkSet { keys: vec![] },
        );

        // Structurally valid JWT signed with an unknown key
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Im1pc3NpbmcifQ.e30.c2ln";
        let err = provider.verify(token, "").unwrap_err();
        assert!(err.to_string().contains("OIDC token validation error"));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let provider =
            OidcProvider::from_parts("https://idp.example.com".to_string(), JwkSet { keys: vec![] });
        assert!(provider.verify("not-a-jwt", "").is_err());
    }
}
