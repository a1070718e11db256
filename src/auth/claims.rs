//! JWT claim parsing and offline validation.
//!
//! Claims are decoded without signature verification for basic sanity
//! checks (expiry, audience). Signature verification, when configured, is
//! performed separately against the OIDC provider's JWKS.

use base64::Engine;
use chrono::Utc;
use serde::Deserialize;

use crate::errors::{AuthErrorType, KubegateError, Result};

/// Audience claim: either a single string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(value) => value == audience,
            Audience::Multiple(values) => values.iter().any(|v| v == audience),
        }
    }
}

/// Claims extracted from a caller's bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl JwtClaims {
    /// Parse the payload segment of a JWT without verifying its signature.
    pub fn parse_unverified(token: &str) -> Result<Self> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (segments.next(), segments.next(), segments.next(), segments.next())
        else {
            return Err(KubegateError::auth(
                "malformed JWT: expected three segments",
                AuthErrorType::InvalidToken,
            ));
        };

        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| {
                KubegateError::auth(
                    format!("failed to decode JWT payload: {}", e),
                    AuthErrorType::InvalidToken,
                )
            })?;

        serde_json::from_slice(&decoded).map_err(|e| {
            KubegateError::auth(
                format!("failed to parse JWT claims: {}", e),
                AuthErrorType::InvalidToken,
            )
        })
    }

    /// Offline validation: expiry and, when configured, the audience.
    pub fn validate_offline(&self, audience: &str) -> Result<()> {
        if let Some(exp) = self.exp {
            if exp <= Utc::now().timestamp() {
                return Err(KubegateError::auth(
                    "JWT token validation error: token is expired",
                    AuthErrorType::InvalidToken,
                ));
            }
        }

        if !audience.is_empty() {
            let matches = self.aud.as_ref().is_some_and(|aud| aud.contains(audience));
            if !matches {
                return Err(KubegateError::auth(
                    "JWT token validation error: audience mismatch",
                    AuthErrorType::InvalidToken,
                ));
            }
        }

        Ok(())
    }

    /// Space-separated scopes from the `scope` claim.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Build an unsigned JWT with the given claims. Test seam shared with the
/// middleware tests.
#[cfg(test)]
pub(crate) fn make_unsigned_token(claims: serde_json::Value) -> String {
    let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header =
        engine.encode(serde_json::to_vec(&serde_json::json!({"alg": "RS256"})).unwrap());
    let payload = engine.encode(serde_json::to_vec(&claims).unwrap());
    format!("{}.{}.signature", header, payload)
}
