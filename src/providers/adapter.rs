//! Provider adapter trait definition
//!
//! Defines the capability interface every platform adapter satisfies. The
//! callback flow only talks to adapters through this trait, so adding a
//! platform never touches shared control flow.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::http_client::{HttpClient, OutboundRequest, RawResponse, TransportError};
use crate::providers::{AuthStyle, Platform, ProviderMetadata};

/// Immutable per-platform configuration resolved at startup
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub platform: Platform,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    /// Base URL for profile lookups
    pub api_base: Url,
    pub scopes: Vec<String>,
    pub auth_style: AuthStyle,
    pub requires_pkce: bool,
    pub supports_refresh: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("platform", &self.platform)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("api_base", &self.api_base.as_str())
            .field("scopes", &self.scopes)
            .field("auth_style", &self.auth_style)
            .field("requires_pkce", &self.requires_pkce)
            .field("supports_refresh", &self.supports_refresh)
            .finish()
    }
}

impl ProviderConfig {
    /// Join a path onto the configured API base
    pub fn api_url(&self, path: &str) -> Result<Url, AdapterError> {
        let base = self.api_base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path.trim_start_matches('/')))?)
    }
}

/// Credentials parsed from a successful token exchange
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: Option<i64>,
    /// Scopes the provider reports as granted, if it reports them at all
    pub granted_scopes: Option<Vec<String>>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in_seconds", &self.expires_in_seconds)
            .field("granted_scopes", &self.granted_scopes)
            .finish()
    }
}

/// Identity of the linked account on the remote platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub platform_user_id: String,
    pub platform_user_name: String,
}

/// Adapter-level failures; the message is safe to show to the end user
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// The provider answered with an explicit error field
    #[error("{description}")]
    Provider { description: String },
    /// Non-success status without a recognizable error payload
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("malformed provider response: {details}")]
    Malformed { details: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("PKCE code verifier missing for {platform}")]
    MissingCodeVerifier { platform: Platform },
    #[error("PKCE code challenge missing for {platform}")]
    MissingCodeChallenge { platform: Platform },
    #[error("invalid provider endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<url::ParseError> for AdapterError {
    fn from(error: url::ParseError) -> Self {
        AdapterError::InvalidEndpoint(error.to_string())
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Resolved configuration for this platform
    fn config(&self) -> &ProviderConfig;

    fn platform(&self) -> Platform {
        self.config().platform
    }

    /// Separator used when joining scopes into the `scope` parameter
    fn scope_separator(&self) -> &'static str {
        " "
    }

    /// Capability descriptor published by the registry
    fn metadata(&self) -> ProviderMetadata {
        let config = self.config();
        ProviderMetadata {
            platform: config.platform,
            authorize_url: config.authorize_url.to_string(),
            token_url: config.token_url.to_string(),
            auth_style: config.auth_style,
            requires_pkce: config.requires_pkce,
            supports_refresh: config.supports_refresh,
            scopes: config.scopes.clone(),
        }
    }

    /// Build the provider authorize URL for the first leg of the flow.
    fn authorize_url(
        &self,
        redirect_uri: &str,
        state: &str,
        code_challenge: Option<&str>,
    ) -> Result<Url, AdapterError> {
        let config = self.config();
        let mut url = config.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &config.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &config.scopes.join(self.scope_separator()))
                .append_pair("response_type", "code")
                .append_pair("state", state);
            if config.requires_pkce {
                let challenge = code_challenge.ok_or(AdapterError::MissingCodeChallenge {
                    platform: config.platform,
                })?;
                query
                    .append_pair("code_challenge", challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }
        Ok(url)
    }

    /// Describe the authorization-code exchange for this platform's auth style.
    fn build_token_request(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<OutboundRequest, AdapterError> {
        let config = self.config();
        let mut request = OutboundRequest::post_form(config.token_url.clone())
            .form_field("grant_type", "authorization_code")
            .form_field("code", code)
            .form_field("redirect_uri", redirect_uri);

        request = match config.auth_style {
            AuthStyle::ClientSecretInBody => request
                .form_field("client_id", config.client_id.as_str())
                .form_field("client_secret", config.client_secret.as_str()),
            AuthStyle::HttpBasicAuth => {
                request.basic_auth(&config.client_id, &config.client_secret)
            }
        };

        if config.requires_pkce {
            let verifier = code_verifier.ok_or(AdapterError::MissingCodeVerifier {
                platform: config.platform,
            })?;
            request = request.form_field("code_verifier", verifier);
        }

        Ok(request)
    }

    /// Interpret the token endpoint response.
    fn parse_token_response(&self, raw: &RawResponse) -> Result<TokenGrant, AdapterError>;

    /// Describe the profile lookup for a fresh access token.
    fn build_profile_request(&self, access_token: &str) -> Result<OutboundRequest, AdapterError>;

    /// Interpret the profile endpoint response.
    fn parse_profile_response(&self, raw: &RawResponse)
    -> Result<PlatformProfile, AdapterError>;

    /// Exchange an authorization code for credentials.
    async fn exchange_code(
        &self,
        http: &dyn HttpClient,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenGrant, AdapterError> {
        let request = self.build_token_request(code, redirect_uri, code_verifier)?;
        let raw = http.send(request).await?;
        self.parse_token_response(&raw)
    }

    /// Fetch the remote identity behind an access token.
    async fn fetch_profile(
        &self,
        http: &dyn HttpClient,
        access_token: &str,
    ) -> Result<PlatformProfile, AdapterError> {
        let request = self.build_profile_request(access_token)?;
        let raw = http.send(request).await?;
        self.parse_profile_response(&raw)
    }
}

/// Parse a JSON body, mapping failures by status
pub(crate) fn json_body(raw: &RawResponse) -> Result<Value, AdapterError> {
    serde_json::from_str(&raw.body).map_err(|e| {
        if raw.is_success() {
            AdapterError::Malformed {
                details: e.to_string(),
            }
        } else {
            AdapterError::Http { status: raw.status }
        }
    })
}

/// RFC 6749 error payload: `{"error": "...", "error_description": "..."}`
pub(crate) fn oauth_error(body: &Value) -> Option<String> {
    let error = body.get("error")?.as_str()?;
    let description = body
        .get("error_description")
        .and_then(Value::as_str)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(error);
    Some(description.to_string())
}

/// Read an integer that some providers encode as a string
pub(crate) fn integer_field(body: &Value, key: &str) -> Option<i64> {
    match body.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Read an identifier that some providers encode as a number
pub(crate) fn id_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub(crate) fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Split a granted-scope string; providers disagree on comma vs space
pub(crate) fn split_scopes(raw: &str) -> Vec<String> {
    raw.split([',', ' '])
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token payload shared by platforms that follow RFC 6749 closely
pub(crate) fn parse_standard_token_response(raw: &RawResponse) -> Result<TokenGrant, AdapterError> {
    let body = json_body(raw)?;

    if let Some(description) = oauth_error(&body) {
        return Err(AdapterError::Provider { description });
    }
    if !raw.is_success() {
        return Err(AdapterError::Http { status: raw.status });
    }

    let access_token = string_field(&body, "access_token").ok_or_else(|| AdapterError::Malformed {
        details: "token response has no access_token".to_string(),
    })?;

    Ok(TokenGrant {
        access_token,
        refresh_token: string_field(&body, "refresh_token"),
        expires_in_seconds: integer_field(&body, "expires_in"),
        granted_scopes: body.get("scope").and_then(Value::as_str).map(split_scopes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_token_response_parses_optional_fields() {
        let raw = RawResponse::new(
            200,
            json!({
                "access_token": "tok",
                "expires_in": "3600",
                "refresh_token": "ref",
                "scope": "openid,profile w_member_social"
            })
            .to_string(),
        );

        let grant = parse_standard_token_response(&raw).unwrap();
        assert_eq!(grant.access_token, "tok");
        assert_eq!(grant.refresh_token.as_deref(), Some("ref"));
        assert_eq!(grant.expires_in_seconds, Some(3600));
        assert_eq!(
            grant.granted_scopes,
            Some(vec![
                "openid".to_string(),
                "profile".to_string(),
                "w_member_social".to_string()
            ])
        );
    }

    #[test]
    fn error_field_wins_over_status() {
        let raw = RawResponse::new(
            200,
            json!({"error": "invalid_grant", "error_description": "Code expired"}).to_string(),
        );
        assert_eq!(
            parse_standard_token_response(&raw),
            Err(AdapterError::Provider {
                description: "Code expired".to_string()
            })
        );

        let bare = RawResponse::new(400, json!({"error": "invalid_request"}).to_string());
        assert_eq!(
            parse_standard_token_response(&bare),
            Err(AdapterError::Provider {
                description: "invalid_request".to_string()
            })
        );
    }

    #[test]
    fn non_json_error_status_reports_http_status() {
        let raw = RawResponse::new(502, "<html>bad gateway</html>");
        assert_eq!(
            parse_standard_token_response(&raw),
            Err(AdapterError::Http { status: 502 })
        );
    }

    #[test]
    fn missing_access_token_is_malformed() {
        let raw = RawResponse::new(200, json!({"token_type": "bearer"}).to_string());
        assert!(matches!(
            parse_standard_token_response(&raw),
            Err(AdapterError::Malformed { .. })
        ));
    }

    #[test]
    fn token_grant_debug_hides_credentials() {
        let grant = TokenGrant {
            access_token: "super-secret".to_string(),
            refresh_token: Some("also-secret".to_string()),
            expires_in_seconds: None,
            granted_scopes: None,
        };
        let rendered = format!("{:?}", grant);
        assert!(!rendered.contains("secret"));
    }
}
