//! Twitter (X) adapter
//!
//! Confidential client: credentials go in an HTTP Basic header and the
//! authorization leg always carries an S256 PKCE challenge.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{OutboundRequest, RawResponse};
use crate::providers::AuthStyle;
use crate::providers::adapter::{
    AdapterError, PlatformProfile, ProviderAdapter, ProviderConfig, TokenGrant, json_body,
    parse_standard_token_response, string_field,
};
use crate::providers::registry::ProviderDefaults;

pub const DEFAULTS: ProviderDefaults = ProviderDefaults {
    authorize_url: "https://twitter.com/i/oauth2/authorize",
    token_url: "https://api.twitter.com/2/oauth2/token",
    api_base: "https://api.twitter.com",
    scopes: &["tweet.read", "tweet.write", "users.read", "offline.access"],
    auth_style: AuthStyle::HttpBasicAuth,
    requires_pkce: true,
    supports_refresh: true,
};

#[derive(Debug, Deserialize)]
struct MeResponse {
    data: MeData,
}

#[derive(Debug, Deserialize)]
struct MeData {
    id: String,
    username: String,
}

/// v2 API problem payloads: `{"detail": ...}` or `{"errors": [{"message": ...}]}`
fn api_error(body: &Value) -> Option<String> {
    string_field(body, "detail").or_else(|| {
        body.get("errors")?
            .as_array()?
            .first()
            .and_then(|e| string_field(e, "detail").or_else(|| string_field(e, "message")))
    })
}

#[derive(Debug, Clone)]
pub struct TwitterAdapter {
    config: ProviderConfig,
}

impl TwitterAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderAdapter for TwitterAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn parse_token_response(&self, raw: &RawResponse) -> Result<TokenGrant, AdapterError> {
        parse_standard_token_response(raw)
    }

    fn build_profile_request(&self, access_token: &str) -> Result<OutboundRequest, AdapterError> {
        Ok(OutboundRequest::get(self.config.api_url("/2/users/me")?).bearer_auth(access_token))
    }

    fn parse_profile_response(
        &self,
        raw: &RawResponse,
    ) -> Result<PlatformProfile, AdapterError> {
        let body = json_body(raw)?;

        if !raw.is_success() {
            return Err(match api_error(&body) {
                Some(description) => AdapterError::Provider { description },
                None => AdapterError::Http { status: raw.status },
            });
        }
        // 200 responses can still carry only `errors` with no `data`
        if body.get("data").is_none() {
            if let Some(description) = api_error(&body) {
                return Err(AdapterError::Provider { description });
            }
        }

        let me: MeResponse = serde_json::from_value(body).map_err(|e| AdapterError::Malformed {
            details: e.to_string(),
        })?;

        Ok(PlatformProfile {
            platform_user_id: me.data.id,
            platform_user_name: me.data.username,
        })
    }
}
