//! LinkedIn adapter
//!
//! Client secret travels in the form body, refresh tokens are kept, and the
//! member identity comes from the OpenID Connect userinfo endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use crate::http_client::{OutboundRequest, RawResponse};
use crate::providers::adapter::{
    AdapterError, PlatformProfile, ProviderAdapter, ProviderConfig, TokenGrant, json_body,
    oauth_error, parse_standard_token_response,
};
use crate::providers::registry::ProviderDefaults;
use crate::providers::AuthStyle;

pub const DEFAULTS: ProviderDefaults = ProviderDefaults {
    authorize_url: "https://www.linkedin.com/oauth/v2/authorization",
    token_url: "https://www.linkedin.com/oauth/v2/accessToken",
    api_base: "https://api.linkedin.com",
    scopes: &["openid", "profile", "w_member_social"],
    auth_style: AuthStyle::ClientSecretInBody,
    requires_pkce: false,
    supports_refresh: true,
};

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

/// LinkedIn adapter
#[derive(Debug, Clone)]
pub struct LinkedinAdapter {
    config: ProviderConfig,
}

impl LinkedinAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderAdapter for LinkedinAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn parse_token_response(&self, raw: &RawResponse) -> Result<TokenGrant, AdapterError> {
        parse_standard_token_response(raw)
    }

    fn build_profile_request(&self, access_token: &str) -> Result<OutboundRequest, AdapterError> {
        Ok(OutboundRequest::get(self.config.api_url("/v2/userinfo")?).bearer_auth(access_token))
    }

    fn parse_profile_response(
        &self,
        raw: &RawResponse,
    ) -> Result<PlatformProfile, AdapterError> {
        let body = json_body(raw)?;
        if !raw.is_success() {
            // userinfo failures use either the OAuth shape or {"message": ...}
            return Err(match oauth_error(&body).or_else(|| {
                body.get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            }) {
                Some(description) => AdapterError::Provider { description },
                None => AdapterError::Http { status: raw.status },
            });
        }

        let info: UserInfo =
            serde_json::from_value(body).map_err(|e| AdapterError::Malformed {
                details: e.to_string(),
            })?;

        let display_name = info
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| match (info.given_name, info.family_name) {
                (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
                (Some(given), None) => Some(given),
                (None, Some(family)) => Some(family),
                (None, None) => None,
            })
            .unwrap_or_else(|| info.sub.clone());

        Ok(PlatformProfile {
            platform_user_id: info.sub,
            platform_user_name: display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Platform;
    use crate::providers::registry::tests::test_config;
    use serde_json::json;

    fn adapter() -> LinkedinAdapter {
        LinkedinAdapter::new(test_config(Platform::Linkedin, &DEFAULTS))
    }

    #[test]
    fn token_request_embeds_client_secret_in_body() {
        let request = adapter()
            .build_token_request("abc", "https://app.test/callback/linkedin", None)
            .unwrap();

        assert_eq!(request.form_value("grant_type"), Some("authorization_code"));
        assert_eq!(request.form_value("code"), Some("abc"));
        assert_eq!(request.form_value("client_id"), Some("linkedin-client"));
        assert_eq!(request.form_value("client_secret"), Some("linkedin-secret"));
        assert_eq!(request.form_value("code_verifier"), None);
        assert_eq!(request.header_value("authorization"), None);
    }

    #[test]
    fn token_response_keeps_refresh_token() {
        let raw = RawResponse::new(
            200,
            json!({"access_token": "tok1", "expires_in": 3600, "refresh_token": "ref1"})
                .to_string(),
        );
        let grant = adapter().parse_token_response(&raw).unwrap();
        assert_eq!(grant.access_token, "tok1");
        assert_eq!(grant.refresh_token.as_deref(), Some("ref1"));
        assert_eq!(grant.expires_in_seconds, Some(3600));
    }

    #[test]
    fn profile_falls_back_to_given_and_family_name() {
        let raw = RawResponse::new(
            200,
            json!({"sub": "abc123", "given_name": "Ada", "family_name": "Lovelace"}).to_string(),
        );
        let profile = adapter().parse_profile_response(&raw).unwrap();
        assert_eq!(profile.platform_user_id, "abc123");
        assert_eq!(profile.platform_user_name, "Ada Lovelace");
    }

    #[test]
    fn profile_error_message_is_surfaced() {
        let raw = RawResponse::new(
            401,
            json!({"status": 401, "message": "Invalid access token"}).to_string(),
        );
        assert_eq!(
            adapter().parse_profile_response(&raw),
            Err(AdapterError::Provider {
                description: "Invalid access token".to_string()
            })
        );
    }
}
