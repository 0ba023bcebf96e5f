//! Provider metadata types
//!
//! Defines the closed platform set, token-exchange auth styles and the
//! capability descriptor published for every registered platform.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Social platforms that can be linked to a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linkedin,
    Instagram,
    Twitter,
    Facebook,
}

impl Platform {
    /// Every supported platform, in stable order
    pub const ALL: [Platform; 4] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Twitter,
    ];

    /// Stable lowercase identifier used in URLs, config keys and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
        }
    }

    /// Prefix used for per-platform configuration keys (e.g. `TWITTER_CLIENT_ID`)
    pub fn config_prefix(&self) -> &'static str {
        match self {
            Platform::Linkedin => "LINKEDIN",
            Platform::Instagram => "INSTAGRAM",
            Platform::Twitter => "TWITTER",
            Platform::Facebook => "FACEBOOK",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a platform identifier is not part of the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform '{0}'")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Ok(Platform::Linkedin),
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// How client credentials are presented to the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthStyle {
    /// `client_id` and `client_secret` sent as form fields
    ClientSecretInBody,
    /// `Authorization: Basic base64(client_id:client_secret)`
    HttpBasicAuth,
}

/// Public capability descriptor for a registered platform (no secrets)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderMetadata {
    /// Platform identifier
    pub platform: Platform,
    /// Provider authorize endpoint
    pub authorize_url: String,
    /// Provider token endpoint
    pub token_url: String,
    /// Token-exchange credential style
    pub auth_style: AuthStyle,
    /// Whether the authorize leg carries a PKCE challenge
    pub requires_pkce: bool,
    /// Whether the platform issues refresh tokens we keep
    pub supports_refresh: bool,
    /// Scopes requested during authorization
    pub scopes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("LinkedIn".parse::<Platform>(), Ok(Platform::Linkedin));
        assert_eq!(" twitter ".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!("x".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!(
            "myspace".parse::<Platform>(),
            Err(UnknownPlatform("myspace".to_string()))
        );
    }

    #[test]
    fn platform_display_matches_serde() {
        for platform in Platform::ALL {
            let json = serde_json::to_value(platform).unwrap();
            assert_eq!(json, serde_json::json!(platform.to_string()));
        }
    }
}
