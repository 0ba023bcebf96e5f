//! Instagram adapter
//!
//! Scopes are comma-separated and the token endpoint reports failures as
//! `{error_type, code, error_message}`. Instagram issues no refresh token.

use async_trait::async_trait;
use serde_json::Value;

use crate::http_client::{OutboundRequest, RawResponse};
use crate::providers::AuthStyle;
use crate::providers::adapter::{
    AdapterError, PlatformProfile, ProviderAdapter, ProviderConfig, TokenGrant, id_field,
    integer_field, json_body, oauth_error, split_scopes, string_field,
};
use crate::providers::registry::ProviderDefaults;

pub const DEFAULTS: ProviderDefaults = ProviderDefaults {
    authorize_url: "https://api.instagram.com/oauth/authorize",
    token_url: "https://api.instagram.com/oauth/access_token",
    api_base: "https://graph.instagram.com",
    scopes: &["instagram_business_basic", "instagram_business_content_publish"],
    auth_style: AuthStyle::ClientSecretInBody,
    requires_pkce: false,
    supports_refresh: false,
};

/// Graph-style errors: `{"error": {"message": ..., "type": ..., "code": ...}}`
fn graph_error(body: &Value) -> Option<String> {
    body.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Token endpoint errors: `{"error_type": ..., "code": ..., "error_message": ...}`
fn token_error(body: &Value) -> Option<String> {
    string_field(body, "error_message")
        .or_else(|| graph_error(body))
        .or_else(|| oauth_error(body))
}

#[derive(Debug, Clone)]
pub struct InstagramAdapter {
    config: ProviderConfig,
}

impl InstagramAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderAdapter for InstagramAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn scope_separator(&self) -> &'static str {
        ","
    }

    fn parse_token_response(&self, raw: &RawResponse) -> Result<TokenGrant, AdapterError> {
        let body = json_body(raw)?;

        if let Some(description) = token_error(&body) {
            return Err(AdapterError::Provider { description });
        }
        if !raw.is_success() {
            return Err(AdapterError::Http { status: raw.status });
        }

        // Newer responses wrap the grant in a single-element `data` array
        let grant = match body.get("data").and_then(Value::as_array) {
            Some(entries) => entries.first().cloned().unwrap_or(Value::Null),
            None => body,
        };

        let access_token = string_field(&grant, "access_token").ok_or_else(|| {
            AdapterError::Malformed {
                details: "token response has no access_token".to_string(),
            }
        })?;

        Ok(TokenGrant {
            access_token,
            refresh_token: None,
            expires_in_seconds: integer_field(&grant, "expires_in"),
            granted_scopes: grant
                .get("permissions")
                .and_then(Value::as_str)
                .map(split_scopes),
        })
    }

    fn build_profile_request(&self, access_token: &str) -> Result<OutboundRequest, AdapterError> {
        let mut url = self.config.api_url("/me")?;
        url.query_pairs_mut()
            .append_pair("fields", "id,username")
            .append_pair("access_token", access_token);
        Ok(OutboundRequest::get(url))
    }

    fn parse_profile_response(
        &self,
        raw: &RawResponse,
    ) -> Result<PlatformProfile, AdapterError> {
        let body = json_body(raw)?;

        if let Some(description) = graph_error(&body) {
            return Err(AdapterError::Provider { description });
        }
        if !raw.is_success() {
            return Err(AdapterError::Http { status: raw.status });
        }

        let platform_user_id = id_field(&body, "id")
            .or_else(|| id_field(&body, "user_id"))
            .ok_or_else(|| AdapterError::Malformed {
                details: "profile response has no id".to_string(),
            })?;
        let platform_user_name =
            string_field(&body, "username").unwrap_or_else(|| platform_user_id.clone());

        Ok(PlatformProfile {
            platform_user_id,
            platform_user_name,
        })
    }
}
