//! Keycloak V1 token exchange.

use async_trait::async_trait;

use crate::errors::Result;
use crate::tokenexchange::{
    do_token_exchange, inject_client_auth, ExchangedToken, TargetTokenExchangeConfig,
    TokenExchanger, FORM_KEY_AUDIENCE, FORM_KEY_GRANT_TYPE, FORM_KEY_SCOPE,
    FORM_KEY_SUBJECT_ISSUER, FORM_KEY_SUBJECT_TOKEN, FORM_KEY_SUBJECT_TOKEN_TYPE,
    GRANT_TYPE_TOKEN_EXCHANGE,
};

/// Keycloak's legacy (v1) token exchange. Identical to RFC 8693 except for
/// the `subject_issuer` form field, which identifies the source IdP alias in
/// cross-realm exchanges, and the absence of `requested_token_type`.
pub struct KeycloakV1Exchanger;

#[async_trait]
impl TokenExchanger for KeycloakV1Exchanger {
    async fn exchange(
        &self,
        cfg: &TargetTokenExchangeConfig,
        subject_token: &str,
    ) -> Result<ExchangedToken> {
        let mut form: Vec<(&'static str, String)> = vec![
            (FORM_KEY_GRANT_TYPE, GRANT_TYPE_TOKEN_EXCHANGE.to_string()),
            (FORM_KEY_SUBJECT_TOKEN, subject_token.to_string()),
            (FORM_KEY_SUBJECT_TOKEN_TYPE, cfg.subject_token_type.clone()),
            (FORM_KEY_AUDIENCE, cfg.audience.clone()),
        ];

        if !cfg.subject_issuer.is_empty() {
            form.push((FORM_KEY_SUBJECT_ISSUER, cfg.subject_issuer.clone()));
        }

        if !cfg.scopes.is_empty() {
            form.push((FORM_KEY_SCOPE, cfg.scopes.join(" ")));
        }

        let authorization = inject_client_auth(cfg, &mut form);

        do_token_exchange(cfg, form, authorization).await
    }
}
