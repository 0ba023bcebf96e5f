//! Facebook adapter
//!
//! Graph API errors arrive nested as `{"error": {"message", "type", "code"}}`
//! on both the token and profile endpoints.

use async_trait::async_trait;
use serde_json::Value;

use crate::http_client::{OutboundRequest, RawResponse};
use crate::providers::AuthStyle;
use crate::providers::adapter::{
    AdapterError, PlatformProfile, ProviderAdapter, ProviderConfig, TokenGrant, id_field,
    integer_field, json_body, oauth_error, string_field,
};
use crate::providers::registry::ProviderDefaults;

pub const DEFAULTS: ProviderDefaults = ProviderDefaults {
    authorize_url: "https://www.facebook.com/v19.0/dialog/oauth",
    token_url: "https://graph.facebook.com/v19.0/oauth/access_token",
    api_base: "https://graph.facebook.com/v19.0",
    scopes: &["public_profile", "pages_show_list", "pages_manage_posts"],
    auth_style: AuthStyle::ClientSecretInBody,
    requires_pkce: false,
    supports_refresh: false,
};

fn graph_error(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Object(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => oauth_error(body),
    }
}

#[derive(Debug, Clone)]
pub struct FacebookAdapter {
    config: ProviderConfig,
}

impl FacebookAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderAdapter for FacebookAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn scope_separator(&self) -> &'static str {
        ","
    }

    fn parse_token_response(&self, raw: &RawResponse) -> Result<TokenGrant, AdapterError> {
        let body = json_body(raw)?;

        if let Some(description) = graph_error(&body) {
            return Err(AdapterError::Provider { description });
        }
        if !raw.is_success() {
            return Err(AdapterError::Http { status: raw.status });
        }

        let access_token = string_field(&body, "access_token").ok_or_else(|| {
            AdapterError::Malformed {
                details: "token response has no access_token".to_string(),
            }
        })?;

        Ok(TokenGrant {
            access_token,
            refresh_token: None,
            expires_in_seconds: integer_field(&body, "expires_in"),
            granted_scopes: None,
        })
    }

    fn build_profile_request(&self, access_token: &str) -> Result<OutboundRequest, AdapterError> {
        let mut url = self.config.api_url("/me")?;
        url.query_pairs_mut().append_pair("fields", "id,name");
        Ok(OutboundRequest::get(url).bearer_auth(access_token))
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

        let platform_user_id = id_field(&body, "id").ok_or_else(|| AdapterError::Malformed {
            details: "profile response has no id".to_string(),
        })?;
        let platform_user_name =
            string_field(&body, "name").unwrap_or_else(|| platform_user_id.clone());

        Ok(PlatformProfile {
            platform_user_id,
            platform_user_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Platform;
    use crate::providers::registry::tests::test_config;
    use serde_json::json;

    fn adapter() -> FacebookAdapter {
        FacebookAdapter::new(test_config(Platform::Facebook, &DEFAULTS))
    }

    #[test]
    fn nested_graph_error_is_surfaced() {
        let raw = RawResponse::new(
            400,
            json!({"error": {
                "message": "Invalid verification code format.",
                "type": "OAuthException",
                "code": 100,
                "fbtrace_id": "abc"
            }})
            .to_string(),
        );
        assert_eq!(
            adapter().parse_token_response(&raw),
            Err(AdapterError::Provider {
                description: "Invalid verification code format.".to_string()
            })
        );
    }

    #[test]
    fn token_response_parses_expiry() {
        let raw = RawResponse::new(
            200,
            json!({"access_token": "fb-token", "token_type": "bearer", "expires_in": 5183944})
                .to_string(),
        );
        let grant = adapter().parse_token_response(&raw).unwrap();
        assert_eq!(grant.access_token, "fb-token");
        assert_eq!(grant.expires_in_seconds, Some(5183944));
        assert_eq!(grant.refresh_token, None);
    }

    #[test]
    fn empty_error_body_reports_status() {
        let raw = RawResponse::new(500, "{}");
        assert_eq!(
            adapter().parse_token_response(&raw),
            Err(AdapterError::Http { status: 500 })
        );
    }

    #[test]
    fn profile_request_asks_for_id_and_name() {
        let request = adapter().build_profile_request("fb-token").unwrap();
        assert_eq!(request.url.path(), "/v19.0/me");
        assert_eq!(request.url.query(), Some("fields=id%2Cname"));
        assert_eq!(request.header_value("authorization"), Some("Bearer fb-token"));
    }

    #[test]
    fn profile_parses_identity() {
        let raw = RawResponse::new(200, json!({"id": "10158", "name": "Ada L"}).to_string());
        let profile = adapter().parse_profile_response(&raw).unwrap();
        assert_eq!(
            profile,
            PlatformProfile {
                platform_user_id: "10158".to_string(),
                platform_user_name: "Ada L".to_string()
            }
        );
    }
}
