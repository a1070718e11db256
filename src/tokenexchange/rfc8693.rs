//! RFC 8693 token exchange.

use async_trait::async_trait;

use crate::errors::Result;
use crate::tokenexchange::{
    do_token_exchange, inject_client_auth, ExchangedToken, TargetTokenExchangeConfig,
    TokenExchanger, FORM_KEY_AUDIENCE, FORM_KEY_GRANT_TYPE, FORM_KEY_REQUESTED_TOKEN_TYPE,
    FORM_KEY_SCOPE, FORM_KEY_SUBJECT_TOKEN, FORM_KEY_SUBJECT_TOKEN_TYPE,
    GRANT_TYPE_TOKEN_EXCHANGE, TOKEN_TYPE_ACCESS_TOKEN,
};

/// Standard OAuth 2.0 token exchange (RFC 8693).
pub struct Rfc8693Exchanger;

#[async_trait]
impl TokenExchanger for Rfc8693Exchanger {
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
            (FORM_KEY_REQUESTED_TOKEN_TYPE, TOKEN_TYPE_ACCESS_TOKEN.to_string()),
        ];

        if !cfg.scopes.is_empty() {
            form.push((FORM_KEY_SCOPE, cfg.scopes.join(" ")));
        }

        let authorization = inject_client_auth(cfg, &mut form);

        do_token_exchange(cfg, form, authorization).await
    }
}
